mod build;
mod build_pipeline;
mod ci;
mod config;
mod eject;
mod init;
mod release;
mod scan;
mod tags;

use dockwright_build::BuildError;
use dockwright_build::context::ContextError;
use dockwright_core::ValidationError;
use dockwright_release::{DispatchError, PublishError, UploadError};

pub use build::build;
pub use ci::ci_init;
pub use config::show_config;
pub use eject::eject;
pub use init::init_project;
pub use release::release;
pub use scan::scan;
pub use tags::tags;

/// Raw event values as given on the command line or by CI.
pub struct EventInput {
    pub event: String,
    pub git_ref: String,
    pub sha: String,
}

/// Process exit status for a failed command.
///
/// | status | cause                                      |
/// |--------|--------------------------------------------|
/// | 2      | configuration or `dockwright.toml` invalid |
/// | 3      | build failed                               |
/// | 4      | event cannot be mapped to tags             |
/// | 5      | publish or findings upload degraded        |
/// | 1      | anything else                              |
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ValidationError>() {
            return 2;
        }
        if cause
            .downcast_ref::<dockwright_core::Error>()
            .is_some_and(dockwright_core::Error::is_configuration)
        {
            return 2;
        }
        if cause.is::<BuildError>() || cause.is::<ContextError>() {
            return 3;
        }
        if cause.is::<DispatchError>() {
            return 4;
        }
        if cause.is::<PublishError>() || cause.is::<UploadError>() {
            return 5;
        }
    }
    1
}
