//! Container Runtime Adapter (C5): a uniform capability over Docker and
//! Podman's Docker-compatible HTTP API.

mod bollard_runtime;
mod error;
mod runtime;
mod tarball;
mod types;

pub use bollard_runtime::BollardRuntime;
pub use error::DockerError;
pub use runtime::ContainerRuntime;
pub use tarball::build_context_tar;
pub use types::{strip_leading_slash, ContainerSummary, NormalizedState, StartOptions};

/// Only containers whose name carries this prefix are ours to manage.
pub(crate) const PREFIX_FILTER: &str = "otturnaut-";
