use std::fmt;
use std::str::FromStr;

use crate::error::DispatchError;

/// What kind of source-control event started the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    PullRequest,
    Manual,
    Scheduled,
}

impl EventKind {
    /// Publishing is never allowed for unreviewed code.
    pub fn may_publish(self) -> bool {
        !matches!(self, EventKind::PullRequest)
    }
}

impl FromStr for EventKind {
    type Err = DispatchError;

    /// Accepts both the short names and GitHub's `github.event_name` values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull_request_target" => Ok(EventKind::PullRequest),
            "manual" | "workflow_dispatch" => Ok(EventKind::Manual),
            "scheduled" | "schedule" => Ok(EventKind::Scheduled),
            other => Err(DispatchError::UnsupportedEvent(other.to_owned())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Manual => "manual",
            EventKind::Scheduled => "scheduled",
        })
    }
}

/// The source-control reference a run was triggered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GitReference {
    Branch { name: String },
    Tag { name: String },
    PullRequest { number: u64 },
    /// Manually dispatched against a branch
    Manual { branch: String },
    /// Scheduled run against a branch
    Scheduled { branch: String },
}

impl GitReference {
    /// Parse a fully-qualified ref (`refs/heads/main`, `refs/tags/v1.2.3`,
    /// `refs/pull/42/merge`) in the context of the event that carried it.
    pub fn parse(event: EventKind, git_ref: &str) -> Result<Self, DispatchError> {
        let mismatch = || DispatchError::EventMismatch {
            event,
            reference: git_ref.to_owned(),
        };

        if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
            if branch.is_empty() {
                return Err(DispatchError::UnrecognizedReference(git_ref.to_owned()));
            }
            let branch = branch.to_owned();
            return match event {
                EventKind::Push => Ok(GitReference::Branch { name: branch }),
                EventKind::Manual => Ok(GitReference::Manual { branch }),
                EventKind::Scheduled => Ok(GitReference::Scheduled { branch }),
                EventKind::PullRequest => Err(mismatch()),
            };
        }

        if let Some(tag) = git_ref.strip_prefix("refs/tags/") {
            if tag.is_empty() {
                return Err(DispatchError::UnrecognizedReference(git_ref.to_owned()));
            }
            // Only a tag push is a release; manual and scheduled runs follow branches.
            return match event {
                EventKind::Push => Ok(GitReference::Tag {
                    name: tag.to_owned(),
                }),
                EventKind::PullRequest | EventKind::Manual | EventKind::Scheduled => {
                    Err(mismatch())
                }
            };
        }

        if let Some(rest) = git_ref.strip_prefix("refs/pull/") {
            let number = rest
                .strip_suffix("/merge")
                .or_else(|| rest.strip_suffix("/head"))
                .ok_or_else(|| DispatchError::UnrecognizedReference(git_ref.to_owned()))?;
            let number = parse_pr_number(number)?;
            return match event {
                EventKind::PullRequest => Ok(GitReference::PullRequest { number }),
                _ => Err(mismatch()),
            };
        }

        Err(DispatchError::UnrecognizedReference(git_ref.to_owned()))
    }

    /// The only event kind this reference can arrive with.
    pub fn implied_event(&self) -> EventKind {
        match self {
            GitReference::Branch { .. } | GitReference::Tag { .. } => EventKind::Push,
            GitReference::PullRequest { .. } => EventKind::PullRequest,
            GitReference::Manual { .. } => EventKind::Manual,
            GitReference::Scheduled { .. } => EventKind::Scheduled,
        }
    }
}

impl fmt::Display for GitReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitReference::Branch { name } => write!(f, "branch {name}"),
            GitReference::Tag { name } => write!(f, "tag {name}"),
            GitReference::PullRequest { number } => write!(f, "pull request #{number}"),
            GitReference::Manual { branch } => write!(f, "manual run on {branch}"),
            GitReference::Scheduled { branch } => write!(f, "scheduled run on {branch}"),
        }
    }
}

fn parse_pr_number(raw: &str) -> Result<u64, DispatchError> {
    match raw.parse::<u64>() {
        Ok(n) if n > 0 && !raw.starts_with('0') => Ok(n),
        _ => Err(DispatchError::InvalidPullRequest(raw.to_owned())),
    }
}

/// A commit hash, 7 to 40 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

/// Length of the commit suffix in branch tags.
pub const SHORT_COMMIT_LEN: usize = 7;

impl CommitId {
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let trimmed = raw.trim();
        let valid = (SHORT_COMMIT_LEN..=40).contains(&trimmed.len())
            && trimmed.chars().all(|c| c.is_ascii_hexdigit());
        if valid {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(DispatchError::InvalidCommit(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..SHORT_COMMIT_LEN]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_accepts_github_names() {
        assert_eq!("push".parse::<EventKind>().unwrap(), EventKind::Push);
        assert_eq!(
            "pull_request_target".parse::<EventKind>().unwrap(),
            EventKind::PullRequest
        );
        assert_eq!(
            "workflow_dispatch".parse::<EventKind>().unwrap(),
            EventKind::Manual
        );
        assert_eq!("schedule".parse::<EventKind>().unwrap(), EventKind::Scheduled);
        assert!("release".parse::<EventKind>().is_err());
    }

    #[test]
    fn parse_branch_push() {
        assert_eq!(
            GitReference::parse(EventKind::Push, "refs/heads/feature/login").unwrap(),
            GitReference::Branch {
                name: "feature/login".to_owned()
            }
        );
    }

    #[test]
    fn parse_manual_and_scheduled_keep_branch() {
        assert_eq!(
            GitReference::parse(EventKind::Manual, "refs/heads/main").unwrap(),
            GitReference::Manual {
                branch: "main".to_owned()
            }
        );
        assert_eq!(
            GitReference::parse(EventKind::Scheduled, "refs/heads/main").unwrap(),
            GitReference::Scheduled {
                branch: "main".to_owned()
            }
        );
    }

    #[test]
    fn parse_tag() {
        assert_eq!(
            GitReference::parse(EventKind::Push, "refs/tags/v2.1.0").unwrap(),
            GitReference::Tag {
                name: "v2.1.0".to_owned()
            }
        );
    }

    #[test]
    fn parse_pull_request() {
        assert_eq!(
            GitReference::parse(EventKind::PullRequest, "refs/pull/42/merge").unwrap(),
            GitReference::PullRequest { number: 42 }
        );
        assert_eq!(
            GitReference::parse(EventKind::PullRequest, "refs/pull/7/head").unwrap(),
            GitReference::PullRequest { number: 7 }
        );
    }

    #[test]
    fn parse_rejects_mismatched_event() {
        assert!(matches!(
            GitReference::parse(EventKind::PullRequest, "refs/heads/main"),
            Err(DispatchError::EventMismatch { .. })
        ));
        assert!(matches!(
            GitReference::parse(EventKind::Push, "refs/pull/1/merge"),
            Err(DispatchError::EventMismatch { .. })
        ));
        for event in [EventKind::Manual, EventKind::Scheduled, EventKind::PullRequest] {
            assert!(matches!(
                GitReference::parse(event, "refs/tags/v1.2.3"),
                Err(DispatchError::EventMismatch { .. })
            ));
        }
    }

    #[test]
    fn parse_rejects_unknown_shapes() {
        for raw in [
            "main",
            "refs/heads/",
            "refs/tags/",
            "refs/remotes/origin/main",
            "refs/pull/abc/merge",
            "refs/pull/0/merge",
            "refs/pull/42",
        ] {
            assert!(
                GitReference::parse(EventKind::PullRequest, raw).is_err()
                    && GitReference::parse(EventKind::Push, raw).is_err(),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn commit_id_validation() {
        let id = CommitId::parse("ABC1234DEF").unwrap();
        assert_eq!(id.as_str(), "abc1234def");
        assert_eq!(id.short(), "abc1234");
        assert!(CommitId::parse("abc12").is_err());
        assert!(CommitId::parse("xyz1234").is_err());
        assert!(CommitId::parse(&"a".repeat(41)).is_err());
    }
}
