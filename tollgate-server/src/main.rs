use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tollgate_core::auth::service::SeedOutcome;
use tollgate_server::{
    infra::{
        config::{Config, ConfigLoad, ConfigLoader},
        startup::{ProdStartupHooks, StartupHooks, build_state},
    },
    routes,
};

#[derive(Parser, Debug)]
#[command(name = "tollgate-server")]
#[command(about = "Authentication server with rotating refresh cookies")]
struct Cli {
    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true, env = "TOLLGATE_ENV_FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides HOST)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    #[command(subcommand)]
    Db(DbCommand),
    /// Create an admin account if the email is not registered yet
    SeedAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "Administrator")]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(cli.env_file.clone())?;

    match cli.command {
        None => run_server(config, cli.serve).await,
        Some(Command::Serve(args)) => run_server(config, args).await,
        Some(Command::Db(DbCommand::Migrate)) => run_db_migrate(&config).await,
        Some(Command::SeedAdmin {
            email,
            password,
            name,
        }) => run_seed_admin(config, &email, &password, &name).await,
    }
}

fn load_runtime_config(env_file: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                |_| "tollgate_server=info,tollgate_core=info,tower_http=info".into(),
            ),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in &warnings {
        warn!(message = %warning, "configuration warning");
    }

    Ok(config)
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = tollgate_server::infra::startup::connect_postgres(config).await?;
    tollgate_core::MIGRATOR
        .run(&pool)
        .await
        .context("failed to apply database migrations")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_seed_admin(
    config: Config,
    email: &str,
    password: &str,
    name: &str,
) -> anyhow::Result<()> {
    let state = build_state(Arc::new(config)).await?;
    match state
        .auth
        .seed_admin(email, password, name)
        .await
        .context("failed to seed admin user")?
    {
        SeedOutcome::Created => info!(email = %email, "admin user created"),
        SeedOutcome::AlreadyExists => {
            warn!(email = %email, "email already registered; nothing to do")
        }
    }
    Ok(())
}

async fn run_server(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let config = Arc::new(config);
    info!(environment = %config.environment, "starting tollgate server");

    let state = build_state(Arc::clone(&config)).await?;
    ProdStartupHooks
        .run(&state)
        .await
        .context("startup hooks failed")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, routes::create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
