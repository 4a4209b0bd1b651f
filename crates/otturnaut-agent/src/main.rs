mod intake;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use otturnaut_core::models::ImageSource;
use otturnaut_core::registry::RuntimeContainer;
use otturnaut_core::{AgentConfig, AppRegistry, PortAllocator};
use otturnaut_docker::{BollardRuntime, ContainerRuntime};
use otturnaut_proxy::CaddyClient;
use otturnaut_saga::{build_pipeline, run_deployment, undeploy, AgentContext, AgentError, DeployRequest, NullSink};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "otturnaut-agent", about = "Host-local deployment orchestration agent")]
struct Cli {
    /// Path to otturnaut.toml. Falls back to OTTURNAUT_CONFIG, then ./otturnaut.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one deployment request read from --file or stdin.
    Run {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Run the saga's real side effects but skip polling for health.
        #[arg(long)]
        dry_run: bool,
    },
    /// Tear down a running app and release its resources.
    Undeploy {
        #[arg(long = "app-id")]
        app_id: String,
    },
    /// Rebuild the registry and port allocator from the runtime's own state.
    Reconcile,
}

fn init_logging() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_format == "json" {
        fmt().json().with_env_filter(filter()).init();
    } else {
        fmt().with_env_filter(filter()).init();
    }
}

fn config_path(cli_arg: Option<PathBuf>) -> PathBuf {
    cli_arg
        .or_else(|| std::env::var_os("OTTURNAUT_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./otturnaut.toml"))
}

fn build_runtime(config: &AgentConfig) -> Result<Arc<dyn ContainerRuntime>> {
    let runtime: Arc<dyn ContainerRuntime> = match config.runtime.kind {
        otturnaut_core::RuntimeKind::Docker => {
            Arc::new(BollardRuntime::docker(&config.runtime.endpoint).context("connecting to docker socket")?)
        }
        otturnaut_core::RuntimeKind::Podman => {
            Arc::new(BollardRuntime::podman(&config.runtime.endpoint).context("connecting to podman socket")?)
        }
    };
    Ok(runtime)
}

fn build_context(config: AgentConfig) -> Result<AgentContext> {
    let runtime = build_runtime(&config)?;
    let proxy = Arc::new(CaddyClient::new(
        &config.caddy.admin_url,
        config.caddy.http_port,
        config.caddy.https_port,
        config.caddy.automatic_https_disable,
    ));
    let ports = Arc::new(PortAllocator::new(config.ports.range_lo, config.ports.range_hi));
    let registry = Arc::new(AppRegistry::new());
    Ok(AgentContext::new(config, ports, registry, runtime, proxy, Arc::new(NullSink)))
}

/// Scan the runtime for otturnaut-owned containers and seed the registry and
/// port allocator before the first request is served.
async fn reconcile(ctx: &AgentContext) -> Result<usize> {
    let containers = ctx
        .runtime
        .list_apps()
        .await
        .context("listing containers for reconciliation")?;
    let runtime_containers: Vec<RuntimeContainer> = containers.into_iter().map(Into::into).collect();
    let recovered = ctx.registry.recover_from_runtime(&runtime_containers, &ctx.ports);
    info!(recovered, "startup reconciliation complete");
    Ok(recovered)
}

/// Map a saga failure to a process exit code: port exhaustion is the one
/// condition a caller might usefully retry against, everything else is
/// treated as a hard failure.
fn exit_code_for(err: &AgentError) -> i32 {
    match err {
        AgentError::PortAllocationFailed(_) => 75, // EX_TEMPFAIL
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let path = config_path(cli.config.clone());
    let config = AgentConfig::load_from_path(&path).context("loading agent configuration")?;

    match cli.command {
        Commands::Run { file, dry_run } => {
            let request = intake::read_deployment(file.as_deref())?;

            // Each request names the runtime backend it targets (spec data
            // model's runtime_kind/runtime_endpoint); that takes precedence
            // over the agent's own config defaults.
            let mut config = config;
            config.runtime.kind = request.runtime_kind;
            config.runtime.endpoint = request.runtime_endpoint.clone();

            let ctx = build_context(config)?;
            reconcile(&ctx).await?;

            let image = match request.source {
                ImageSource::Image { image } => image,
                ImageSource::Source { source } => build_pipeline(
                    ctx.runtime.as_ref(),
                    ctx.progress.as_ref(),
                    &request.app_id,
                    &source.repo_url,
                    &source.r#ref,
                    &source.dockerfile,
                    &source.build_args,
                    source.ssh_key_path.as_deref(),
                )
                .await
                .context("build pipeline")?,
            };

            let deploy_request = DeployRequest {
                app_id: request.app_id,
                deployment_id: request.deployment_id,
                image,
                container_port: request.container_port,
                env: request.env,
                domains: request.domains,
                dry_run,
            };

            match run_deployment(&ctx, deploy_request).await {
                Ok(record) => {
                    println!("{}", serde_json::to_string(&record)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(error = %e, "deployment failed");
                    std::process::exit(exit_code_for(&e));
                }
            }
        }
        Commands::Undeploy { app_id } => {
            let ctx = build_context(config)?;
            reconcile(&ctx).await?;
            undeploy(&ctx, &app_id).await;
            info!(app_id, "undeploy complete");
            Ok(())
        }
        Commands::Reconcile => {
            let ctx = build_context(config)?;
            let recovered = reconcile(&ctx).await?;
            info!(recovered, "reconcile command finished");
            let records = ctx.registry.list();
            println!("{}", serde_json::to_string(&records)?);
            Ok(())
        }
    }
}
