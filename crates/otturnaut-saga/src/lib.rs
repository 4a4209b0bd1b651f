//! Deployment Saga (C7): a blue-green orchestration of the build pipeline,
//! port allocator, container runtime, and route manager, with per-step
//! compensation on failure.

mod build;
mod context;
mod deploy;
mod engine;
mod error;
mod progress;
mod undeploy;

pub use build::build_pipeline;
pub use context::AgentContext;
pub use deploy::{run_deployment, DeployRequest};
pub use engine::{SagaEngine, Step};
pub use error::AgentError;
pub use progress::{NullSink, Progress, ProgressSink};
pub use undeploy::undeploy;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use otturnaut_core::models::AppRecord;
    use otturnaut_core::{AgentConfig, AppRegistry, PortAllocator};

    use crate::context::AgentContext;
    use crate::deploy::{run_deployment, DeployRequest};
    use crate::progress::NullSink;
    use crate::testing::{MockProxy, MockRuntime};
    use crate::undeploy::undeploy;

    fn ctx_with(
        runtime: Arc<MockRuntime>,
        proxy: Arc<MockProxy>,
        lo: u16,
        hi: u16,
    ) -> AgentContext {
        let mut config = AgentConfig::default();
        config.health_check.max_attempts = 5;
        config.health_check.interval_ms = 1;
        AgentContext::new(
            config,
            Arc::new(PortAllocator::new(lo, hi)),
            Arc::new(AppRegistry::new()),
            runtime,
            proxy,
            Arc::new(NullSink),
        )
    }

    fn request(app_id: &str, domains: Vec<String>) -> DeployRequest {
        DeployRequest {
            app_id: app_id.to_string(),
            deployment_id: "dep1".to_string(),
            image: "myapp:latest".to_string(),
            container_port: 3000,
            env: HashMap::new(),
            domains,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn scenario_1_fresh_deployment() {
        let proxy = Arc::new(MockProxy::new());
        let ctx = ctx_with(Arc::new(MockRuntime::new_healthy()), proxy.clone(), 10000, 20000);

        let record = run_deployment(&ctx, request("myapp", vec!["myapp.com".to_string()]))
            .await
            .unwrap();

        assert!((10000..=20000).contains(&record.port));
        assert_eq!(record.container_name, "otturnaut-myapp-dep1");
        assert_eq!(ctx.registry.list().len(), 1);

        let routes = proxy.routes_snapshot();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].domains, vec!["myapp.com".to_string()]);
        assert_eq!(routes[0].port, record.port);
    }

    #[tokio::test]
    async fn scenario_2_port_allocation_failure() {
        let allocator = PortAllocator::new(50000, 50010);
        for port in 50000..=50010u16 {
            allocator.mark_in_use(port).unwrap();
        }
        let runtime = Arc::new(MockRuntime::new_healthy());
        let config = AgentConfig::default();
        let ctx = AgentContext::new(
            config,
            Arc::new(allocator),
            Arc::new(AppRegistry::new()),
            runtime.clone(),
            Arc::new(MockProxy::new()),
            Arc::new(NullSink),
        );

        let result = run_deployment(&ctx, request("myapp", vec![])).await;
        assert!(matches!(result, Err(crate::AgentError::PortAllocationFailed(_))));
        assert!(ctx.registry.get("myapp").is_err());
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn scenario_3_health_check_failure_compensates() {
        let runtime = Arc::new(MockRuntime::new_never_healthy());
        let ctx = ctx_with(runtime.clone(), Arc::new(MockProxy::new()), 10000, 20000);

        let result = run_deployment(&ctx, request("myapp", vec![])).await;
        assert!(matches!(result, Err(crate::AgentError::HealthCheckFailed)));

        assert!(ctx.registry.get("myapp").is_err());
        assert!(ctx.ports.list_allocated().is_empty());
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn scenario_4_blue_green_replacement() {
        let runtime = Arc::new(MockRuntime::new_healthy());
        let ctx = ctx_with(runtime.clone(), Arc::new(MockProxy::new()), 10000, 20000);
        ctx.ports.mark_in_use(9999).unwrap();
        ctx.registry.put(AppRecord::new(
            "myapp",
            "old-dep",
            "otturnaut-myapp-old-dep",
            9999,
            vec!["myapp.com".to_string()],
        ));

        let record = run_deployment(&ctx, request("myapp", vec!["myapp.com".to_string()]))
            .await
            .unwrap();

        assert_ne!(record.port, 9999);
        assert!(!ctx.ports.in_use(9999));
        assert_eq!(ctx.registry.list().len(), 1);
        assert_eq!(ctx.registry.get("myapp").unwrap().port, record.port);

        assert!(runtime.stopped_names().contains(&"otturnaut-myapp-old-dep".to_string()));
    }

    #[tokio::test]
    async fn scenario_5_caddy_unavailable_during_switch() {
        let runtime = Arc::new(MockRuntime::new_healthy());
        let proxy = Arc::new(MockProxy::new_always_unavailable());
        let ctx = ctx_with(runtime.clone(), proxy, 10000, 20000);
        ctx.ports.mark_in_use(9999).unwrap();
        ctx.registry.put(AppRecord::new(
            "myapp",
            "old-dep",
            "otturnaut-myapp-old-dep",
            9999,
            vec!["myapp.com".to_string()],
        ));

        let result = run_deployment(&ctx, request("myapp", vec!["myapp.com".to_string()])).await;
        assert!(matches!(result, Err(crate::AgentError::RouteSwitchFailed(_))));

        // Old record/route untouched; new port released, new container gone.
        assert_eq!(ctx.registry.get("myapp").unwrap().port, 9999);
        assert!(ctx.ports.in_use(9999));
        assert_eq!(ctx.ports.list_allocated(), vec![9999]);
        // The new container was created then torn down by compensation; the
        // old one was never materialized in the runtime mock (only in C4).
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn scenario_6_idempotent_undeploy() {
        let ctx = ctx_with(
            Arc::new(MockRuntime::new_healthy()),
            Arc::new(MockProxy::new()),
            10000,
            20000,
        );
        run_deployment(&ctx, request("myapp", vec!["myapp.com".to_string()]))
            .await
            .unwrap();

        undeploy(&ctx, "myapp").await;
        assert!(ctx.registry.get("myapp").is_err());
        assert!(ctx.ports.list_allocated().is_empty());

        // Second call is a no-op, still succeeds.
        undeploy(&ctx, "myapp").await;
        assert!(ctx.registry.get("myapp").is_err());
    }
}
