//! Reads a single `Deployment` request as one JSON object from a file or
//! stdin. A minimal local harness, not a control-plane wire protocol.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use otturnaut_core::models::Deployment;

pub fn read_deployment(file: Option<&Path>) -> Result<Deployment> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading deployment request from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading deployment request from stdin")?;
            buf
        }
    };
    serde_json::from_str(raw.trim()).context("parsing deployment request JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_deployment() {
        let json = r#"{
            "deployment_id": "dep1",
            "app_id": "myapp",
            "image": "myapp:latest",
            "container_port": 3000,
            "runtime_kind": "docker",
            "runtime_endpoint": "/var/run/docker.sock",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), json).unwrap();
        let deployment = read_deployment(Some(tmp.path())).unwrap();
        assert_eq!(deployment.app_id, "myapp");
    }
}
