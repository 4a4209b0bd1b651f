//! In-crate test doubles for `ContainerRuntime` and `RouteManager`, used to
//! drive saga tests without a real Docker or Caddy socket.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use otturnaut_docker::{ContainerRuntime, ContainerSummary, DockerError, NormalizedState, StartOptions};
use otturnaut_proxy::{ProxyError, Route, RouteManager};

#[derive(Clone)]
struct MockContainer {
    image: String,
    port: u16,
    running: bool,
}

pub struct MockRuntime {
    containers: Mutex<HashMap<String, MockContainer>>,
    stopped: Mutex<Vec<String>>,
    healthy: bool,
}

impl MockRuntime {
    pub fn new_healthy() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
            stopped: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn new_never_healthy() -> Self {
        Self {
            containers: Mutex::new(HashMap::new()),
            stopped: Mutex::new(Vec::new()),
            healthy: false,
        }
    }

    pub fn stopped_names(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_apps(&self) -> Result<Vec<ContainerSummary>, DockerError> {
        let containers = self.containers.lock().unwrap();
        Ok(containers
            .iter()
            .map(|(name, c)| ContainerSummary {
                id: name.clone(),
                names: vec![name.clone()],
                image: c.image.clone(),
                state: if c.running {
                    NormalizedState::Running
                } else {
                    NormalizedState::Stopped
                },
                ports: vec![c.port],
            })
            .collect())
    }

    async fn create_container(&self, opts: &StartOptions) -> Result<String, DockerError> {
        self.containers.lock().unwrap().insert(
            opts.name.clone(),
            MockContainer {
                image: opts.image.clone(),
                port: opts.host_port,
                running: false,
            },
        );
        Ok(opts.name.clone())
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers.get_mut(id).ok_or(DockerError::NotFound)?;
        container.running = self.healthy;
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout_secs: i64) -> Result<(), DockerError> {
        self.stopped.lock().unwrap().push(id.to_string());
        if let Some(container) = self.containers.lock().unwrap().get_mut(id) {
            container.running = false;
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str, _force: bool) -> Result<(), DockerError> {
        self.containers.lock().unwrap().remove(id);
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSummary, DockerError> {
        let containers = self.containers.lock().unwrap();
        let c = containers.get(id).ok_or(DockerError::NotFound)?;
        Ok(ContainerSummary {
            id: id.to_string(),
            names: vec![id.to_string()],
            image: c.image.clone(),
            state: if c.running {
                NormalizedState::Running
            } else {
                NormalizedState::Stopped
            },
            ports: vec![c.port],
        })
    }

    async fn pull_image(&self, _image_ref: &str) -> Result<(), DockerError> {
        Ok(())
    }

    async fn load_image(&self, _tar_path: &Path) -> Result<String, DockerError> {
        Ok("loaded:mock".to_string())
    }

    async fn build_image(
        &self,
        _ctx_dir: &Path,
        tag: &str,
        _dockerfile: &str,
        _build_args: &HashMap<String, String>,
    ) -> Result<String, DockerError> {
        Ok(tag.to_string())
    }
}

pub struct MockProxy {
    routes: Mutex<HashMap<String, Route>>,
    unavailable: bool,
}

impl MockProxy {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            unavailable: false,
        }
    }

    pub fn new_always_unavailable() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }

    pub fn routes_snapshot(&self) -> Vec<Route> {
        self.routes.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl RouteManager for MockProxy {
    async fn add_route(&self, route: &Route) -> Result<(), ProxyError> {
        if self.unavailable {
            return Err(ProxyError::CaddyUnavailable);
        }
        self.routes.lock().unwrap().insert(route.id.clone(), route.clone());
        Ok(())
    }

    async fn remove_route(&self, route_id: &str) -> Result<(), ProxyError> {
        self.routes.lock().unwrap().remove(route_id);
        Ok(())
    }

    async fn get_route(&self, route_id: &str) -> Result<Route, ProxyError> {
        self.routes
            .lock()
            .unwrap()
            .get(route_id)
            .cloned()
            .ok_or(ProxyError::NotFound)
    }

    async fn list_routes(&self) -> Result<Vec<Route>, ProxyError> {
        Ok(self.routes.lock().unwrap().values().cloned().collect())
    }

    async fn health_check(&self) -> Result<(), ProxyError> {
        if self.unavailable {
            Err(ProxyError::CaddyUnavailable)
        } else {
            Ok(())
        }
    }
}
