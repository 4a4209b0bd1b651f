use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::generate_id;

/// Either a fully-qualified image reference or a source-build descriptor —
/// exactly one is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSource {
    Image { image: String },
    Source { source: SourceBuild },
}

/// A git repository build descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBuild {
    pub repo_url: String,
    #[serde(default = "default_ref")]
    pub r#ref: String,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    #[serde(default)]
    pub build_args: HashMap<String, String>,
    #[serde(default)]
    pub ssh_key_path: Option<String>,
}

fn default_ref() -> String {
    "main".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

/// Tagged variant for the two runtime wire-compatible backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl Default for RuntimeKind {
    fn default() -> Self {
        RuntimeKind::Docker
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

/// The input to the saga, and the record it is progressively populated
/// into. Immutable except for the saga-populated fields below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub deployment_id: String,
    pub app_id: String,
    #[serde(flatten)]
    pub source: ImageSource,
    pub container_port: u16,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub runtime_kind: RuntimeKind,
    pub runtime_endpoint: String,

    // Saga-populated fields.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub previous_container_name: Option<String>,
    #[serde(default)]
    pub previous_port: Option<u16>,
    #[serde(default = "default_status")]
    pub status: DeploymentStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_status() -> DeploymentStatus {
    DeploymentStatus::Pending
}

impl Deployment {
    /// Construct a fresh request with a newly generated `deployment_id`, as
    /// the caller would.
    pub fn new(
        app_id: impl Into<String>,
        source: ImageSource,
        container_port: u16,
        runtime_kind: RuntimeKind,
        runtime_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            deployment_id: generate_id(),
            app_id: app_id.into(),
            source,
            container_port,
            env: HashMap::new(),
            domains: Vec::new(),
            runtime_kind,
            runtime_endpoint: runtime_endpoint.into(),
            port: None,
            container_name: None,
            container_id: None,
            previous_container_name: None,
            previous_port: None,
            status: DeploymentStatus::Pending,
            error: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_xor_source_round_trips_through_json() {
        let dep = Deployment::new(
            "myapp",
            ImageSource::Image {
                image: "myapp:latest".to_string(),
            },
            3000,
            RuntimeKind::Docker,
            "/var/run/docker.sock",
        );
        let json = serde_json::to_string(&dep).unwrap();
        let back: Deployment = serde_json::from_str(&json).unwrap();
        assert_eq!(back.app_id, dep.app_id);
        match back.source {
            ImageSource::Image { image } => assert_eq!(image, "myapp:latest"),
            ImageSource::Source { .. } => panic!("expected image variant"),
        }
    }

    #[test]
    fn source_build_defaults_match_spec() {
        let json = r#"{"repo_url": "git@example.com:org/repo.git"}"#;
        let build: SourceBuild = serde_json::from_str(json).unwrap();
        assert_eq!(build.r#ref, "main");
        assert_eq!(build.dockerfile, "Dockerfile");
        assert!(build.ssh_key_path.is_none());
    }
}
