use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::RegistryError;
use crate::models::{AppRecord, AppStatus};
use crate::naming::parse_container_name;
use crate::ports::PortAllocator;

/// The minimal view of the container runtime the registry needs for startup
/// reconciliation — kept here (rather than depending on `otturnaut-docker`)
/// to avoid a cyclic crate dependency; `otturnaut-docker`'s `ContainerRuntime`
/// trait is a superset of this and satisfies it for free.
#[derive(Debug, Clone)]
pub struct RuntimeContainer {
    pub name: String,
    pub status: AppStatus,
    pub port: Option<u16>,
}

/// A single-writer, many-reader store keyed by `app_id`. All
/// operations are synchronous, serialized with respect to each other behind
/// one mutex, and complete in microseconds — no lock is ever held across
/// network I/O.
pub struct AppRegistry {
    records: Mutex<HashMap<String, AppRecord>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, record: AppRecord) {
        self.records.lock().unwrap().insert(record.app_id.clone(), record);
    }

    pub fn get(&self, app_id: &str) -> Result<AppRecord, RegistryError> {
        self.records
            .lock()
            .unwrap()
            .get(app_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(app_id.to_string()))
    }

    pub fn delete(&self, app_id: &str) {
        self.records.lock().unwrap().remove(app_id);
    }

    pub fn list(&self) -> Vec<AppRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    /// Apply a single-field update to an existing record; no-op if the
    /// record has disappeared underneath the caller (lost race to a
    /// concurrent deploy of the same app; the later writer wins).
    pub fn update_status(&self, app_id: &str, status: AppStatus) {
        if let Some(record) = self.records.lock().unwrap().get_mut(app_id) {
            record.status = status;
        }
    }

    /// Enumerate containers whose names begin with the agent's prefix,
    /// reconstruct records, insert them, and inform the port allocator of
    /// any bound ports. Unparseable names are dropped with
    /// `deployment_id = "unknown"`; non-`Running` containers are skipped.
    pub fn recover_from_runtime(
        &self,
        containers: &[RuntimeContainer],
        port_allocator: &PortAllocator,
    ) -> usize {
        let mut recovered = 0;
        for container in containers {
            if container.status != AppStatus::Running {
                continue;
            }
            let parsed = parse_container_name(&container.name);
            let (app_id, deployment_id) = match parsed {
                Some(p) => (p.app_id, p.deployment_id),
                None => continue, // externally-owned container, not ours to track
            };
            let port = match container.port {
                Some(p) => p,
                None => continue,
            };
            let _ = port_allocator.mark_in_use(port);
            self.put(AppRecord {
                app_id: app_id.clone(),
                deployment_id: if deployment_id.is_empty() {
                    "unknown".to_string()
                } else {
                    deployment_id
                },
                container_name: container.name.clone(),
                port,
                domains: Vec::new(),
                status: AppStatus::Running,
                updated_at: chrono::Utc::now(),
            });
            recovered += 1;
        }
        recovered
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}
