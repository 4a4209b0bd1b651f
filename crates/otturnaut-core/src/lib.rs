pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod naming;
pub mod ports;
pub mod registry;

pub use config::AgentConfig;
pub use error::{PortError, RegistryError};
pub use models::{AppRecord, AppStatus, Deployment, DeploymentStatus, ImageSource, RuntimeKind, SourceBuild};
pub use ports::PortAllocator;
pub use registry::{AppRegistry, RuntimeContainer};
