use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use otturnaut_core::models::{AppRecord, AppStatus};
use otturnaut_core::naming;
use otturnaut_docker::StartOptions;
use otturnaut_proxy::Route;

use crate::context::AgentContext;
use crate::engine::{SagaEngine, Step};
use crate::error::AgentError;
use crate::progress::Progress;

/// Mutable running state threaded between blue-green steps. Each step reads
/// what it needs and `run_deployment` copies each step's output in after it
/// completes — the steps themselves stay free of direct knowledge of each
/// other.
#[derive(Default)]
struct DeployState {
    previous: Option<AppRecord>,
    port: Option<u16>,
    container_name: Option<String>,
    container_id: Option<String>,
}

struct DeployCtx<'a> {
    agent: &'a AgentContext,
    app_id: String,
    deployment_id: String,
    image: String,
    container_port: u16,
    env: HashMap<String, String>,
    domains: Vec<String>,
    max_attempts: u32,
    interval: Duration,
    dry_run: bool,
    state: RefCell<DeployState>,
}

/// What `SwitchRoute` actually did, so its compensation knows whether to
/// restore the previous route, remove the new one, or do nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RouteOutcome {
    NoRouteNeeded,
    Switched,
}

struct LoadPreviousState;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for LoadPreviousState {
    type Output = Option<AppRecord>;

    fn name(&self) -> &'static str {
        "load_previous_state"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<Self::Output, AgentError> {
        ctx.agent.progress.notify(Progress::Deployment {
            step: self.name().to_string(),
            message: format!("looking up existing record for {}", ctx.app_id),
        });
        match ctx.agent.registry.get(&ctx.app_id) {
            Ok(record) => Ok(Some(record)),
            Err(_) => Ok(None),
        }
    }
}

struct AllocatePort;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for AllocatePort {
    type Output = u16;

    fn name(&self) -> &'static str {
        "allocate_port"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<u16, AgentError> {
        ctx.agent.progress.notify(Progress::Deployment {
            step: self.name().to_string(),
            message: "allocating a port".to_string(),
        });
        Ok(ctx.agent.ports.allocate()?)
    }

    async fn undo(&self, ctx: &DeployCtx<'a>, port: &u16) {
        ctx.agent.ports.release(*port);
    }
}

struct StartContainer;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for StartContainer {
    type Output = (String, String);

    fn name(&self) -> &'static str {
        "start_container"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<(String, String), AgentError> {
        let port = ctx.state.borrow().port.expect("allocate_port ran first");
        let name = naming::container_name(&ctx.app_id, &ctx.deployment_id);

        ctx.agent.progress.notify(Progress::Deployment {
            step: self.name().to_string(),
            message: format!("starting {name} on port {port}"),
        });

        let opts = StartOptions {
            name: name.clone(),
            image: ctx.image.clone(),
            host_port: port,
            container_port: ctx.container_port,
            env: ctx.env.clone(),
        };
        let container_id = ctx
            .agent
            .runtime
            .start(&opts)
            .await
            .map_err(AgentError::ContainerStartFailed)?;
        Ok((name, container_id))
    }

    async fn undo(&self, ctx: &DeployCtx<'a>, (name, _id): &(String, String)) {
        let _ = ctx.agent.runtime.stop_container(name, 10).await;
        let _ = ctx.agent.runtime.remove_container(name, true).await;
    }
}

struct HealthCheck;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for HealthCheck {
    type Output = ();

    fn name(&self) -> &'static str {
        "health_check"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<(), AgentError> {
        let name = ctx
            .state
            .borrow()
            .container_name
            .clone()
            .expect("start_container ran first");

        if ctx.dry_run {
            ctx.agent.progress.notify(Progress::Deployment {
                step: self.name().to_string(),
                message: format!("dry-run: skipping poll for {name}"),
            });
            return Ok(());
        }

        ctx.agent.progress.notify(Progress::Deployment {
            step: self.name().to_string(),
            message: format!("waiting for {name} to become healthy"),
        });

        for attempt in 1..=ctx.max_attempts {
            match ctx.agent.runtime.status_by_name(&name).await {
                Ok(Some(summary)) if summary.state == otturnaut_docker::NormalizedState::Running => {
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, attempt, "health check poll failed"),
            }
            if attempt < ctx.max_attempts {
                tokio::time::sleep(ctx.interval).await;
            }
        }
        Err(AgentError::HealthCheckFailed)
    }
}

struct SwitchRoute;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for SwitchRoute {
    type Output = RouteOutcome;

    fn name(&self) -> &'static str {
        "switch_route"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<RouteOutcome, AgentError> {
        if ctx.domains.is_empty() {
            return Ok(RouteOutcome::NoRouteNeeded);
        }
        let port = ctx.state.borrow().port.expect("allocate_port ran first");
        let route = Route::new(&ctx.app_id, ctx.domains.clone(), port);

        ctx.agent.progress.notify(Progress::Deployment {
            step: self.name().to_string(),
            message: format!("routing {} to port {port}", ctx.app_id),
        });

        ctx.agent
            .proxy
            .add_route(&route)
            .await
            .map_err(AgentError::RouteSwitchFailed)?;
        Ok(RouteOutcome::Switched)
    }

    async fn undo(&self, ctx: &DeployCtx<'a>, outcome: &RouteOutcome) {
        if *outcome != RouteOutcome::Switched {
            return;
        }
        let previous = ctx.state.borrow().previous.clone();
        match previous {
            Some(prev) if !prev.domains.is_empty() => {
                let restore = Route::new(&ctx.app_id, prev.domains.clone(), prev.port);
                if let Err(e) = ctx.agent.proxy.add_route(&restore).await {
                    tracing::warn!(error = %e, "failed to restore previous route during compensation");
                }
            }
            _ => {
                let route_id = naming::route_id(&ctx.app_id);
                if let Err(e) = ctx.agent.proxy.remove_route(&route_id).await {
                    tracing::warn!(error = %e, "failed to remove new route during compensation");
                }
            }
        }
    }
}

struct Cleanup;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for Cleanup {
    type Output = ();

    fn name(&self) -> &'static str {
        "cleanup_previous"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<(), AgentError> {
        let previous = ctx.state.borrow().previous.clone();
        let Some(previous) = previous else {
            return Ok(());
        };

        ctx.agent.progress.notify(Progress::Deployment {
            step: self.name().to_string(),
            message: format!("retiring {}", previous.container_name),
        });

        // Irreversible by design: once the old container is stopped and its
        // port released, the switch in step 5 has already made the new
        // version live. Failures here are logged,
        // not propagated.
        if let Err(e) = ctx.agent.runtime.stop_container(&previous.container_name, 10).await {
            tracing::warn!(error = %e, container = %previous.container_name, "failed to stop previous container");
        }
        if let Err(e) = ctx.agent.runtime.remove_container(&previous.container_name, true).await {
            tracing::warn!(error = %e, container = %previous.container_name, "failed to remove previous container");
        }
        ctx.agent.ports.release(previous.port);
        Ok(())
    }
}

struct UpdateAppState;
#[async_trait]
impl<'a> Step<DeployCtx<'a>> for UpdateAppState {
    type Output = Option<AppRecord>;

    fn name(&self) -> &'static str {
        "update_app_state"
    }

    async fn run(&self, ctx: &DeployCtx<'a>) -> Result<Option<AppRecord>, AgentError> {
        let state = ctx.state.borrow();
        let record = AppRecord {
            app_id: ctx.app_id.clone(),
            deployment_id: ctx.deployment_id.clone(),
            container_name: state.container_name.clone().expect("start_container ran first"),
            port: state.port.expect("allocate_port ran first"),
            domains: ctx.domains.clone(),
            status: AppStatus::Running,
            updated_at: chrono::Utc::now(),
        };
        ctx.agent.registry.put(record);
        Ok(state.previous.clone())
    }

    async fn undo(&self, ctx: &DeployCtx<'a>, previous: &Option<AppRecord>) {
        match previous {
            Some(prev) => ctx.agent.registry.put(prev.clone()),
            None => ctx.agent.registry.delete(&ctx.app_id),
        }
    }
}

/// Parameters needed to run the blue-green saga once the image to deploy is
/// already resolved (the build pipeline, if any, has already produced it).
pub struct DeployRequest {
    pub app_id: String,
    pub deployment_id: String,
    pub image: String,
    pub container_port: u16,
    pub env: HashMap<String, String>,
    pub domains: Vec<String>,
    pub dry_run: bool,
}

/// Run the blue-green deployment saga end to end. Returns
/// the new `AppRecord` on success, or the first structured step error on
/// failure after compensation has already unwound everything recorded so
/// far.
pub async fn run_deployment(
    agent: &AgentContext,
    request: DeployRequest,
) -> Result<AppRecord, AgentError> {
    let ctx = DeployCtx {
        agent,
        app_id: request.app_id,
        deployment_id: request.deployment_id,
        image: request.image,
        container_port: request.container_port,
        env: request.env,
        domains: request.domains,
        max_attempts: agent.config.health_check.max_attempts,
        interval: Duration::from_millis(agent.config.health_check.interval_ms),
        dry_run: request.dry_run,
        state: RefCell::new(DeployState::default()),
    };

    let load_previous_state = LoadPreviousState;
    let allocate_port = AllocatePort;
    let start_container = StartContainer;
    let health_check = HealthCheck;
    let switch_route = SwitchRoute;
    let cleanup = Cleanup;
    let update_app_state = UpdateAppState;

    let mut engine = SagaEngine::new(&ctx);

    let previous = engine.run(&load_previous_state).await?;
    ctx.state.borrow_mut().previous = previous;

    let port = engine.run(&allocate_port).await?;
    ctx.state.borrow_mut().port = Some(port);

    let (container_name, container_id) = engine.run(&start_container).await?;
    ctx.state.borrow_mut().container_name = Some(container_name);
    ctx.state.borrow_mut().container_id = Some(container_id);

    engine.run(&health_check).await?;
    engine.run(&switch_route).await?;
    engine.run(&cleanup).await?;
    engine.run(&update_app_state).await?;

    Ok(agent
        .registry
        .get(&ctx.app_id)
        .expect("update_app_state just wrote this record"))
}
