use crate::context::AgentContext;
use crate::progress::Progress;

/// Linear, idempotent teardown — not a saga. Every action swallows
/// "already gone" errors; the overall result is always a success.
pub async fn undeploy(agent: &AgentContext, app_id: &str) {
    let record = match agent.registry.get(app_id) {
        Ok(record) => record,
        Err(_) => {
            agent.progress.notify(Progress::Undeploy {
                step: "lookup".to_string(),
                message: format!("no record for {app_id}, nothing to do"),
            });
            return;
        }
    };

    agent.progress.notify(Progress::Undeploy {
        step: "stop".to_string(),
        message: record.container_name.clone(),
    });
    match agent.runtime.status_by_name(&record.container_name).await {
        Ok(Some(summary)) if summary.state == otturnaut_docker::NormalizedState::Running => {
            if let Err(e) = agent.runtime.stop_container(&record.container_name, 10).await {
                tracing::warn!(error = %e, container = %record.container_name, "undeploy: stop failed");
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, container = %record.container_name, "undeploy: status check failed"),
    }

    agent.progress.notify(Progress::Undeploy {
        step: "remove".to_string(),
        message: record.container_name.clone(),
    });
    if let Err(e) = agent.runtime.remove_container(&record.container_name, true).await {
        tracing::warn!(error = %e, container = %record.container_name, "undeploy: remove failed");
    }

    if !record.domains.is_empty() {
        let route_id = otturnaut_core::naming::route_id(app_id);
        agent.progress.notify(Progress::Undeploy {
            step: "remove_route".to_string(),
            message: route_id.clone(),
        });
        if let Err(e) = agent.proxy.remove_route(&route_id).await {
            tracing::warn!(error = %e, %route_id, "undeploy: route removal failed");
        }
    }

    agent.ports.release(record.port);
    agent.registry.delete(app_id);
    agent.progress.notify(Progress::Undeploy {
        step: "done".to_string(),
        message: app_id.to_string(),
    });
}
