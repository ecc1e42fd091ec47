//! Registry tag derivation.
//!
//! | Reference                  | Tags                                          |
//! |----------------------------|-----------------------------------------------|
//! | default branch `main`      | `latest`, `main`, `main-<sha7>`               |
//! | other branch `feature/x`   | `feature-x`, `feature-x-<sha7>`               |
//! | tag `v1.2.3`               | `v1.2.3`, `v1.2`, `v1`, `1.2.3`, `1.2`, `1`   |
//! | tag `v1.2.3-rc.1`          | `v1.2.3-rc.1`, `1.2.3-rc.1`                   |
//! | pull request 42            | `pr-42`                                       |
//!
//! Tags from different rules never collide: branch names that would
//! sanitize into another rule's namespace are rejected.

use std::fmt;

use crate::error::DispatchError;
use crate::reference::{CommitId, GitReference, SHORT_COMMIT_LEN};

/// Maximum length of a registry tag.
pub const MAX_TAG_LEN: usize = 128;

pub const LATEST: &str = "latest";

/// A registry-safe tag: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageTag(String);

impl ImageTag {
    /// Accepts only strings that already satisfy the tag grammar.
    pub fn parse(raw: &str) -> Option<Self> {
        is_valid_tag(raw).then(|| Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImageTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn is_valid_tag(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    s.len() <= MAX_TAG_LEN
        && (first.is_ascii_alphanumeric() || first == '_')
        && chars.all(is_tag_char)
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Project-level inputs to tag derivation.
#[derive(Debug, Clone)]
pub struct TagRules {
    /// Branch that receives `latest`
    pub default_branch: String,
    /// Tag reserved for the security scan image
    pub scan_tag: String,
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            default_branch: "main".to_owned(),
            scan_tag: "scan".to_owned(),
        }
    }
}

/// Compute the tag set for a reference. Pure; never touches a registry.
pub fn derive_tags(
    reference: &GitReference,
    commit: &CommitId,
    rules: &TagRules,
) -> Result<Vec<ImageTag>, DispatchError> {
    let raw = match reference {
        GitReference::Branch { name }
        | GitReference::Manual { branch: name }
        | GitReference::Scheduled { branch: name } => branch_tags(name, commit, rules)?,
        GitReference::Tag { name } => version_tags(name)?,
        GitReference::PullRequest { number } => vec![format!("pr-{number}")],
    };

    let mut tags: Vec<ImageTag> = Vec::with_capacity(raw.len());
    for tag in raw {
        let Some(tag) = ImageTag::parse(&tag) else {
            return Err(DispatchError::InvalidTag(tag));
        };
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn branch_tags(
    branch: &str,
    commit: &CommitId,
    rules: &TagRules,
) -> Result<Vec<String>, DispatchError> {
    let sanitized = sanitize_branch(branch)
        .ok_or_else(|| DispatchError::UnrepresentableBranch(branch.to_owned()))?;

    if let Some(reason) = reserved(&sanitized, rules) {
        tracing::debug!(branch, tag = %sanitized, reason, "branch tag is reserved");
        return Err(DispatchError::ReservedBranch {
            branch: branch.to_owned(),
            tag: sanitized,
        });
    }

    let mut tags = Vec::with_capacity(3);
    if branch == rules.default_branch {
        tags.push(LATEST.to_owned());
    }
    let commit_tag = format!("{sanitized}-{}", commit.short());
    tags.push(sanitized);
    tags.push(commit_tag);
    Ok(tags)
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `-`, strip
/// leading `.` and `-`, and leave room for the `-<sha7>` suffix.
pub fn sanitize_branch(branch: &str) -> Option<String> {
    let replaced: String = branch
        .chars()
        .map(|c| if is_tag_char(c) { c } else { '-' })
        .collect();
    let trimmed = replaced.trim_start_matches(['.', '-']);
    let limit = MAX_TAG_LEN - SHORT_COMMIT_LEN - 1;
    let truncated: String = trimmed.chars().take(limit).collect();
    (!truncated.is_empty()).then_some(truncated)
}

/// Why a sanitized branch name cannot be used, if it cannot.
fn reserved(tag: &str, rules: &TagRules) -> Option<&'static str> {
    if tag == LATEST {
        return Some("latest");
    }
    if tag == rules.scan_tag {
        return Some("scan image");
    }
    // `pr` itself would own `pr-<sha7>` when the short commit is all digits
    if tag == "pr" {
        return Some("pull request");
    }
    if let Some(n) = tag.strip_prefix("pr-") {
        if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) {
            return Some("pull request");
        }
    }
    if is_version_shaped(tag) {
        return Some("version");
    }
    if has_commit_suffix(tag) {
        return Some("commit suffix");
    }
    None
}

/// `1`, `v2.3`, `1.2.3-rc.1` and the like.
fn is_version_shaped(tag: &str) -> bool {
    let body = tag.strip_prefix('v').unwrap_or(tag);
    let core = body.split_once('-').map_or(body, |(core, _)| core);
    !core.is_empty()
        && core
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Ends in `-` followed by seven hex characters, like `main-abc1234`.
fn has_commit_suffix(tag: &str) -> bool {
    match tag.rsplit_once('-') {
        Some((head, suffix)) => {
            !head.is_empty()
                && suffix.len() == SHORT_COMMIT_LEN
                && suffix.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        }
        None => false,
    }
}

/// A parsed `[v]MAJOR.MINOR.PATCH[-PRERELEASE]` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
}

impl Version {
    pub fn parse(name: &str) -> Result<Self, DispatchError> {
        let unrecognized = || DispatchError::UnrecognizedTag(name.to_owned());

        let body = name.strip_prefix('v').unwrap_or(name);
        if body.contains('+') {
            return Err(DispatchError::BuildMetadata(name.to_owned()));
        }
        let (core, prerelease) = match body.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (body, None),
        };

        let mut parts = core.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(unrecognized());
        };
        let numeric = |part: &str| -> Result<u64, DispatchError> {
            let leading_zero = part.len() > 1 && part.starts_with('0');
            if part.is_empty() || leading_zero || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(unrecognized());
            }
            part.parse().map_err(|_| unrecognized())
        };

        if let Some(pre) = prerelease {
            let valid = pre.split('.').all(|id| {
                !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
            if !valid {
                return Err(unrecognized());
            }
        }

        Ok(Self {
            major: numeric(major)?,
            minor: numeric(minor)?,
            patch: numeric(patch)?,
            prerelease: prerelease.map(str::to_owned),
        })
    }
}

fn version_tags(name: &str) -> Result<Vec<String>, DispatchError> {
    let Version {
        major,
        minor,
        patch,
        prerelease,
    } = Version::parse(name)?;

    let tags = match prerelease {
        // a prerelease never moves the floating tags
        Some(pre) => vec![
            format!("v{major}.{minor}.{patch}-{pre}"),
            format!("{major}.{minor}.{patch}-{pre}"),
        ],
        None => vec![
            format!("v{major}.{minor}.{patch}"),
            format!("v{major}.{minor}"),
            format!("v{major}"),
            format!("{major}.{minor}.{patch}"),
            format!("{major}.{minor}"),
            format!("{major}"),
        ],
    };
    Ok(tags)
}
