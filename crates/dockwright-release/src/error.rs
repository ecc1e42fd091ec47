use crate::reference::EventKind;

/// The triggering event cannot be mapped to tags. Nothing is pushed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("unsupported event '{0}' (expected push, pull_request, workflow_dispatch, or schedule)")]
    UnsupportedEvent(String),

    #[error("unrecognized git reference '{0}'")]
    UnrecognizedReference(String),

    #[error("{event} event cannot carry reference '{reference}'")]
    EventMismatch { event: EventKind, reference: String },

    #[error("invalid commit id '{0}': expected 7 to 40 hexadecimal characters")]
    InvalidCommit(String),

    #[error("tag '{0}' is not a semantic version (vMAJOR.MINOR.PATCH)")]
    UnrecognizedTag(String),

    #[error("tag '{0}' carries build metadata, which registry tags cannot represent")]
    BuildMetadata(String),

    #[error("branch '{0}' has no characters usable in a registry tag")]
    UnrepresentableBranch(String),

    #[error("branch '{branch}' would produce tag '{tag}', which is reserved")]
    ReservedBranch { branch: String, tag: String },

    #[error("derived tag '{0}' is not a valid registry tag")]
    InvalidTag(String),

    #[error("invalid pull request number '{0}'")]
    InvalidPullRequest(String),
}
