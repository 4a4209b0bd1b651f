use thiserror::Error;

/// The saga's structured error taxonomy. `reason` in a failed
/// result is always the *first* step failure; undo failures are logged, not
/// surfaced here.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("no ports available: {0}")]
    PortAllocationFailed(#[from] otturnaut_core::error::PortError),
    #[error("failed to start container: {0}")]
    ContainerStartFailed(#[source] otturnaut_docker::DockerError),
    #[error("health check did not pass within the configured attempts")]
    HealthCheckFailed,
    #[error("failed to switch route: {0}")]
    RouteSwitchFailed(#[source] otturnaut_proxy::ProxyError),
    #[error("git clone failed (exit {0}): {1}")]
    CloneFailed(i32, String),
    #[error("image build failed: {0}")]
    BuildFailed(String),
    #[error("caddy admin api unavailable")]
    CaddyUnavailable,
    #[error("no app record for app_id {0}")]
    AppNotFound(String),
}

impl From<otturnaut_git::FetchError> for AgentError {
    fn from(err: otturnaut_git::FetchError) -> Self {
        match err {
            otturnaut_git::FetchError::CloneFailed(code, stderr) => {
                AgentError::CloneFailed(code, stderr)
            }
            other => AgentError::BuildFailed(other.to_string()),
        }
    }
}
