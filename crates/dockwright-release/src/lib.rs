//! Release dispatch for dockwright.
//!
//! ```text
//! GITHUB_EVENT_NAME / GITHUB_REF / GITHUB_SHA
//!   → ReleaseContext          (reference.rs)
//!   → derive_tags             (tags.rs)        pure, fails closed
//!   → plan                    (dispatch.rs)    capability check per registry
//!   → build                   (dockwright-build)
//!   → Publisher::publish      (publish.rs)     per (registry, tag) isolation
//! ```
//!
//! The scan side runs a vulnerability scanner against the built image and
//! renders the findings as SARIF, optionally uploading them.

pub mod dispatch;
pub mod error;
pub mod publish;
pub mod reference;
pub mod registry;
pub mod sarif;
pub mod scan;
pub mod tags;
pub mod upload;

pub use dispatch::{Destination, ReleaseContext, ReleasePlan, SkippedTarget, plan};
pub use error::DispatchError;
pub use publish::{PublishError, PublishReport, Publisher, PushError, ReleaseStatus};
pub use reference::{CommitId, EventKind, GitReference};
pub use registry::{AuthRequirement, Capability, Credentials, RegistryTarget, Secrets};
pub use sarif::{SarifError, to_sarif, write_sarif};
pub use scan::{Finding, ScanError, ScanReport, Scanner, Severity};
pub use tags::{ImageTag, TagRules, derive_tags};
pub use upload::{FindingsUploader, UploadError};
