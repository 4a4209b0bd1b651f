use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use otturnaut_core::registry::RuntimeContainer;

use crate::error::DockerError;
use crate::types::{ContainerSummary, StartOptions};

/// Uniform capability over the Docker-compatible HTTP API, implemented
/// against either a Docker or a Podman socket.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Containers whose names carry the agent's prefix.
    async fn list_apps(&self) -> Result<Vec<ContainerSummary>, DockerError>;

    async fn create_container(
        &self,
        opts: &StartOptions,
    ) -> Result<String, DockerError>;

    async fn start_container(&self, id: &str) -> Result<(), DockerError>;

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), DockerError>;

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), DockerError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerSummary, DockerError>;

    async fn pull_image(&self, image_ref: &str) -> Result<(), DockerError>;

    async fn load_image(&self, tar_path: &Path) -> Result<String, DockerError>;

    async fn build_image(
        &self,
        ctx_dir: &Path,
        tag: &str,
        dockerfile: &str,
        build_args: &HashMap<String, String>,
    ) -> Result<String, DockerError>;

    /// Composite `create` then `start`. If `start` fails, the created
    /// container is *not* automatically removed — the caller's saga
    /// compensation handles it.
    async fn start(&self, opts: &StartOptions) -> Result<String, DockerError> {
        let container_id = self.create_container(opts).await?;
        self.start_container(&container_id).await?;
        Ok(container_id)
    }

    /// Current normalized status of a container by name, used by the
    /// health check step. `NotFound` surfaces as
    /// `Ok(None)` so callers can treat "gone" and "stopped" uniformly.
    async fn status_by_name(&self, name: &str) -> Result<Option<ContainerSummary>, DockerError> {
        match self.list_apps().await {
            Ok(containers) => Ok(containers.into_iter().find(|c| c.names.iter().any(|n| n == name))),
            Err(e) => Err(e),
        }
    }
}

impl From<ContainerSummary> for RuntimeContainer {
    fn from(summary: ContainerSummary) -> Self {
        RuntimeContainer {
            name: summary
                .names
                .into_iter()
                .next()
                .unwrap_or_default(),
            status: summary.state.as_app_status(),
            port: summary.ports.into_iter().next(),
        }
    }
}
