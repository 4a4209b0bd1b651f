use thiserror::Error;

/// Errors surfaced by the Container Runtime Adapter.
#[derive(Error, Debug)]
pub enum DockerError {
    #[error("container not found")]
    NotFound,
    #[error("http error {0}: {1}")]
    Http(u16, String),
    #[error("could not parse loaded image reference from daemon output")]
    CouldNotParseImage,
    #[error("build failed: {0}")]
    BuildError(String),
    #[error("failed to create build context tarball: {0}")]
    TarballCreateFailed(String),
    #[error("failed to read build context tarball: {0}")]
    TarballReadFailed(String),
    #[error("no port mapping present on container")]
    NoPortMapping,
}

impl DockerError {
    /// Map a raw bollard error onto the error taxonomy above, using 404 →
    /// NotFound as the one special-cased status.
    pub fn from_bollard(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => {
                if *status_code == 404 {
                    DockerError::NotFound
                } else {
                    DockerError::Http(*status_code, message.clone())
                }
            }
            other => DockerError::Http(0, other.to_string()),
        }
    }
}
