use std::collections::HashMap;

use otturnaut_core::AppStatus;
use serde::{Deserialize, Serialize};

/// Options for `create`/`start`.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub env: HashMap<String, String>,
}

/// A runtime-reported container, normalized from the Docker-compatible
/// wire shape: status collapsed to `Running`/`Stopped`/`Unknown`, names
/// stripped of their leading `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: NormalizedState,
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NormalizedState {
    Running,
    Stopped,
    Unknown,
}

impl NormalizedState {
    pub fn from_wire(state: &str) -> Self {
        match state {
            "running" => NormalizedState::Running,
            "exited" | "created" | "paused" => NormalizedState::Stopped,
            _ => NormalizedState::Unknown,
        }
    }

    pub fn as_app_status(&self) -> AppStatus {
        match self {
            NormalizedState::Running => AppStatus::Running,
            _ => AppStatus::Stopped,
        }
    }
}

/// Strip the single leading `/` the Docker API prefixes container names
/// with.
pub fn strip_leading_slash(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_slash() {
        assert_eq!(strip_leading_slash("/otturnaut-myapp-dep1"), "otturnaut-myapp-dep1");
        assert_eq!(strip_leading_slash("no-slash"), "no-slash");
    }

    #[test]
    fn normalizes_wire_states() {
        assert_eq!(NormalizedState::from_wire("running"), NormalizedState::Running);
        assert_eq!(NormalizedState::from_wire("exited"), NormalizedState::Stopped);
        assert_eq!(NormalizedState::from_wire("created"), NormalizedState::Stopped);
        assert_eq!(NormalizedState::from_wire("paused"), NormalizedState::Stopped);
        assert_eq!(NormalizedState::from_wire("dead"), NormalizedState::Unknown);
    }
}
