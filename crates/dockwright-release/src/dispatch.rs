use crate::error::DispatchError;
use crate::reference::{CommitId, EventKind, GitReference};
use crate::registry::{Capability, Credentials, RegistryTarget, Secrets};
use crate::tags::{ImageTag, TagRules, derive_tags};

/// The triggering event of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseContext {
    pub event: EventKind,
    pub reference: GitReference,
    pub commit: CommitId,
}

impl ReleaseContext {
    /// Parse raw CI values (`GITHUB_EVENT_NAME`, `GITHUB_REF`, `GITHUB_SHA`).
    pub fn parse(event: &str, git_ref: &str, commit: &str) -> Result<Self, DispatchError> {
        let event: EventKind = event.parse()?;
        Ok(Self {
            event,
            reference: GitReference::parse(event, git_ref)?,
            commit: CommitId::parse(commit)?,
        })
    }

    fn check_consistency(&self) -> Result<(), DispatchError> {
        if self.reference.implied_event() != self.event {
            return Err(DispatchError::EventMismatch {
                event: self.event,
                reference: self.reference.to_string(),
            });
        }
        Ok(())
    }
}

/// One enabled registry and the references it will receive.
#[derive(Debug, Clone)]
pub struct Destination {
    pub target: String,
    pub repository: String,
    pub credentials: Option<Credentials>,
    /// `repository:tag`, one per planned tag
    pub references: Vec<String>,
}

/// A registry left out of this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTarget {
    pub target: String,
    pub missing: Vec<String>,
}

/// What a run will push, decided before anything is built.
#[derive(Debug, Clone)]
pub struct ReleasePlan {
    pub tags: Vec<ImageTag>,
    /// False for pull requests: build only.
    pub publish: bool,
    pub destinations: Vec<Destination>,
    pub skipped: Vec<SkippedTarget>,
}

impl ReleasePlan {
    /// Every `(target, reference)` pair that will be pushed.
    pub fn pushes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.destinations.iter().flat_map(|d| {
            d.references
                .iter()
                .map(move |reference| (d.target.as_str(), reference.as_str()))
        })
    }

    pub fn push_count(&self) -> usize {
        self.destinations.iter().map(|d| d.references.len()).sum()
    }
}

/// Decide tags and destinations for one run.
///
/// Pull requests never publish, whatever registries are enabled. For other
/// events each target is checked once; targets lacking credentials are
/// skipped, not failed.
pub fn plan(
    context: &ReleaseContext,
    rules: &TagRules,
    targets: &[RegistryTarget],
    secrets: &Secrets,
) -> Result<ReleasePlan, DispatchError> {
    context.check_consistency()?;
    let tags = derive_tags(&context.reference, &context.commit, rules)?;

    if !context.event.may_publish() {
        tracing::info!(reference = %context.reference, "build only, nothing is published");
        return Ok(ReleasePlan {
            tags,
            publish: false,
            destinations: Vec::new(),
            skipped: Vec::new(),
        });
    }

    let mut destinations = Vec::new();
    let mut skipped = Vec::new();
    for target in targets {
        match target.capability(secrets) {
            Capability::Enabled { credentials } => {
                let references = tags.iter().map(|t| target.reference(t.as_str())).collect();
                destinations.push(Destination {
                    target: target.name.clone(),
                    repository: target.repository.clone(),
                    credentials,
                    references,
                });
            }
            Capability::Disabled { missing } => {
                tracing::warn!(
                    registry = %target.name,
                    missing = %missing.join(", "),
                    "registry disabled: credentials not available"
                );
                skipped.push(SkippedTarget {
                    target: target.name.clone(),
                    missing,
                });
            }
        }
    }

    Ok(ReleasePlan {
        tags,
        publish: true,
        destinations,
        skipped,
    })
}
