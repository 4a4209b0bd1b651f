use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::image::{BuildImageOptions, CreateImageOptions, ImportImageOptions};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::{debug, warn};

use crate::error::DockerError;
use crate::runtime::ContainerRuntime;
use crate::tarball::build_context_tar;
use crate::types::{strip_leading_slash, ContainerSummary, NormalizedState, StartOptions};

/// `ContainerRuntime` backed by the Docker Engine API over a unix socket,
/// shared between Docker and Podman — they speak the same wire protocol, so
/// the only difference between the two constructors is the endpoint path.
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn docker(endpoint: &str) -> Result<Self, DockerError> {
        let docker = Docker::connect_with_socket(endpoint, 120, bollard::API_DEFAULT_VERSION)
            .map_err(DockerError::from_bollard)?;
        Ok(Self { docker })
    }

    pub fn podman(endpoint: &str) -> Result<Self, DockerError> {
        // Podman's Docker-compatible socket speaks the same protocol; no
        // separate client type is needed.
        let docker = Docker::connect_with_socket(endpoint, 120, bollard::API_DEFAULT_VERSION)
            .map_err(DockerError::from_bollard)?;
        Ok(Self { docker })
    }

    fn to_summary(container: bollard::models::ContainerSummary) -> ContainerSummary {
        let names = container
            .names
            .unwrap_or_default()
            .iter()
            .map(|n| strip_leading_slash(n).to_string())
            .collect();
        let ports = container
            .ports
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.public_port)
            .collect();
        let state = container
            .state
            .as_deref()
            .map(NormalizedState::from_wire)
            .unwrap_or(NormalizedState::Unknown);

        ContainerSummary {
            id: container.id.unwrap_or_default(),
            names,
            image: container.image.unwrap_or_default(),
            state,
            ports,
        }
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn list_apps(&self) -> Result<Vec<ContainerSummary>, DockerError> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![crate::PREFIX_FILTER.to_string()]);

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(DockerError::from_bollard)?;

        Ok(containers.into_iter().map(Self::to_summary).collect())
    }

    async fn create_container(&self, opts: &StartOptions) -> Result<String, DockerError> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            format!("{}/tcp", opts.container_port),
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(opts.host_port.to_string()),
            }]),
        );

        let env: Vec<String> = opts
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let config = Config {
            image: Some(opts.image.clone()),
            env: Some(env),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_opts = CreateContainerOptions {
            name: opts.name.clone(),
            platform: None,
        };

        let result = self
            .docker
            .create_container(Some(create_opts), config)
            .await
            .map_err(DockerError::from_bollard)?;

        for warning in &result.warnings {
            warn!(container = %opts.name, %warning, "docker create warning");
        }

        Ok(result.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(DockerError::from_bollard)
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), DockerError> {
        let options = StopContainerOptions { t: timeout_secs };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(DockerError::from_bollard)
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) => match DockerError::from_bollard(e) {
                // Removing an already-gone container is the desired end
                // state, not a failure.
                DockerError::NotFound => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSummary, DockerError> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(DockerError::from_bollard)?;

        let names = inspect
            .name
            .map(|n| vec![strip_leading_slash(&n).to_string()])
            .unwrap_or_default();

        let state = inspect
            .state
            .and_then(|s| s.status)
            .map(|status| NormalizedState::from_wire(&status.to_string().to_lowercase()))
            .unwrap_or(NormalizedState::Unknown);

        // Descend into NetworkSettings.Ports, pick the first non-empty
        // binding, and read its HostPort as an integer. Any structural
        // absence along the way is a NoPortMapping error, not a silent
        // empty list.
        let port = inspect
            .network_settings
            .and_then(|ns| ns.ports)
            .and_then(|ports| ports.into_values().flatten().find(|bindings| !bindings.is_empty()))
            .and_then(|bindings| bindings.into_iter().next())
            .and_then(|binding| binding.host_port)
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or(DockerError::NoPortMapping)?;

        Ok(ContainerSummary {
            id: inspect.id.unwrap_or_else(|| id.to_string()),
            names,
            image: inspect.image.unwrap_or_default(),
            state,
            ports: vec![port],
        })
    }

    async fn pull_image(&self, image_ref: &str) -> Result<(), DockerError> {
        let options = CreateImageOptions {
            from_image: image_ref.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(event) = stream.next().await {
            let progress = event.map_err(DockerError::from_bollard)?;
            if let Some(status) = progress.status {
                debug!(image = %image_ref, %status, "pull progress");
            }
        }
        Ok(())
    }

    async fn load_image(&self, tar_path: &Path) -> Result<String, DockerError> {
        let bytes = tokio::fs::read(tar_path)
            .await
            .map_err(|e| DockerError::TarballReadFailed(e.to_string()))?;

        let mut stream = self
            .docker
            .import_image(ImportImageOptions::default(), bytes.into(), None);

        let mut loaded_ref = None;
        while let Some(event) = stream.next().await {
            let info = event.map_err(DockerError::from_bollard)?;
            if let Some(stream_msg) = info.stream {
                if let Some(reference) = stream_msg.trim().strip_prefix("Loaded image: ") {
                    loaded_ref = Some(reference.to_string());
                }
            }
        }

        loaded_ref.ok_or(DockerError::CouldNotParseImage)
    }

    async fn build_image(
        &self,
        ctx_dir: &Path,
        tag: &str,
        dockerfile: &str,
        build_args: &HashMap<String, String>,
    ) -> Result<String, DockerError> {
        let tar_bytes = build_context_tar(ctx_dir).await?;

        let options = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            buildargs: build_args.clone(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(tar_bytes.into()));
        let mut build_error = None;
        while let Some(event) = stream.next().await {
            match event {
                Ok(info) => {
                    if let Some(stream_msg) = info.stream {
                        debug!(%tag, message = %stream_msg.trim_end(), "build output");
                    }
                    if let Some(error) = info.error {
                        build_error = Some(error);
                    }
                }
                Err(e) => return Err(DockerError::from_bollard(e)),
            }
        }

        if let Some(error) = build_error {
            return Err(DockerError::BuildError(error));
        }

        Ok(tag.to_string())
    }
}
