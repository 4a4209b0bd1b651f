use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The status of a live app record (distinct from `DeploymentStatus`, which
/// tracks a single saga run).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    Running,
    Stopped,
    Deploying,
}

/// The value stored in the App Registry per live application. At most
/// one exists per `app_id`; no two records share a port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
    pub app_id: String,
    pub deployment_id: String,
    pub container_name: String,
    pub port: u16,
    pub domains: Vec<String>,
    pub status: AppStatus,
    pub updated_at: DateTime<Utc>,
}

impl AppRecord {
    pub fn new(
        app_id: impl Into<String>,
        deployment_id: impl Into<String>,
        container_name: impl Into<String>,
        port: u16,
        domains: Vec<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            deployment_id: deployment_id.into(),
            container_name: container_name.into(),
            port,
            domains,
            status: AppStatus::Running,
            updated_at: Utc::now(),
        }
    }

    /// A route exists in Caddy iff `domains` is non-empty.
    pub fn needs_route(&self) -> bool {
        !self.domains.is_empty()
    }
}
