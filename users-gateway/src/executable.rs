//! Main entry point for CLI command to start the gateway.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::axum_factory::make_router;
use crate::client::ResourceClient;
use crate::configuration::generate_config_schema;
use crate::configuration::Configuration;
use crate::gateway::Gateway;
use crate::registry::Registry;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Options for the gateway
#[derive(Parser, Debug)]
#[command(name = "gateway", about = "GraphQL gateway over the users and companies service")]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace), or any tracing EnvFilter directive.
    #[arg(long = "log", default_value = "info", alias = "log-level", env = "GATEWAY_LOG")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "GATEWAY_LOG_FORMAT")]
    log_format: LogFormat,

    /// Configuration file location.
    #[arg(short, long = "config", env = "GATEWAY_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Overrides `server.listen`.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Overrides `resources.base_url`.
    #[arg(long)]
    base_url: Option<Url>,

    /// Prints the GraphQL schema and exits.
    #[arg(long)]
    print_schema: bool,

    /// Prints the configuration JSON schema and exits.
    #[arg(long)]
    print_config_schema: bool,
}

impl Opt {
    /// Loads the configuration file, if any, and applies command line overrides.
    fn configuration(&self) -> Result<Configuration> {
        let mut configuration = match &self.config_path {
            Some(path) => Configuration::from_file(path)
                .with_context(|| format!("could not load {}", path.display()))?,
            None => Configuration::default(),
        };
        if let Some(listen) = self.listen {
            configuration.server.listen = listen;
        }
        if let Some(base_url) = &self.base_url {
            configuration.resources.base_url = base_url.clone();
        }
        Ok(configuration)
    }
}

/// This is the main gateway entrypoint.
pub fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(start(Opt::parse()))
}

async fn start(opt: Opt) -> Result<()> {
    if opt.print_config_schema {
        let schema = generate_config_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let registry = Arc::new(Registry::users_and_companies()?);
    if opt.print_schema {
        print!("{}", registry.to_sdl());
        return Ok(());
    }

    init_subscriber(&opt.log_level, opt.log_format)?;
    setup_panic_handler();

    let configuration = opt.configuration()?;
    let client = ResourceClient::new(
        configuration.resources.base_url.clone(),
        configuration.resources.timeout,
    )
    .context("could not create the resource service client")?;
    let gateway = Gateway::new(registry, client)?;
    let router = make_router(gateway, &configuration.server.path);

    let listener = tokio::net::TcpListener::bind(configuration.server.listen)
        .await
        .with_context(|| format!("could not listen on {}", configuration.server.listen))?;
    tracing::info!(
        "GraphQL endpoint exposed at http://{}{} 🚀, resources at {}",
        listener.local_addr()?,
        configuration.server.path,
        configuration.resources.base_url,
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stopped");
    Ok(())
}

fn init_subscriber(log_level: &str, format: LogFormat) -> Result<()> {
    let builder = tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::try_new(log_level).context("could not parse log configuration")?);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow::anyhow!("could not install the tracing subscriber: {err}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn setup_panic_handler() {
    // Redirect panics to the logs.
    std::panic::set_hook(Box::new(|panic| {
        tracing::error!("{}", panic);
    }));
}
