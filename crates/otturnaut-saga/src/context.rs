use std::sync::Arc;

use otturnaut_core::{AgentConfig, AppRegistry, PortAllocator};
use otturnaut_docker::ContainerRuntime;
use otturnaut_proxy::RouteManager;

use crate::progress::ProgressSink;

/// Explicit capability bundle wired once per request, rather than reaching
/// for module-level singletons.
pub struct AgentContext {
    pub config: AgentConfig,
    pub ports: Arc<PortAllocator>,
    pub registry: Arc<AppRegistry>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub proxy: Arc<dyn RouteManager>,
    pub progress: Arc<dyn ProgressSink>,
}

impl AgentContext {
    pub fn new(
        config: AgentConfig,
        ports: Arc<PortAllocator>,
        registry: Arc<AppRegistry>,
        runtime: Arc<dyn ContainerRuntime>,
        proxy: Arc<dyn RouteManager>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            ports,
            registry,
            runtime,
            proxy,
            progress,
        }
    }
}
