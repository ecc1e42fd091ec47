//! Dockerfile generation, build context staging, and the stage pipeline.
//!
//! # Build pipeline
//!
//! ```text
//! dockwright build
//!   1. Resolve      ── build-time values validated (dockwright-core)
//!   2. Dockerfile   ── DockerfileGenerator::render() or .dockwright/Dockerfile
//!   3. Context      ── git ls-files <app dir> → .dockwright/context/
//!   4. Stages       ── deps → builder → runner, one `docker build --target` each
//!   5. Output tag   ── docker tag <runner artifact> <output tag>
//! ```
//!
//! # Stage isolation
//!
//! Every stage is built as its own image. A stage only sees the artifacts of
//! the stages it declares in `depends_on`; intermediate images are removed
//! once their last consumer has finished, leaving only the runner image.

pub mod context;
pub mod docker;
pub mod dockerfile;
pub mod eject;
pub mod executor;
pub mod pipeline;
pub mod tool;

pub use docker::{DockerClient, DockerError};
pub use dockerfile::DockerfileGenerator;
pub use executor::{RealExecutor, ToolExecutor};
pub use pipeline::{Artifact, BuildError, BuildStage, Pipeline, SourceTree, StageRunner};
pub use tool::ToolError;
