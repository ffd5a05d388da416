//! deskpair - Desktop app pairing backend

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deskpair::{
    api::{self, AppState},
    client::DesktopAuthClient,
    config::Config,
    db::{self, repositories::SqlxDesktopSessionRepository},
    pairing::{DeliveryChannel, PairingFlow, PairingState, RecordingChannel, SystemUriOpener},
    services::{
        cleanup, DesktopSessionService, IssuanceService, RemoteIdentityProvider, TokenCodec,
        VerificationService,
    },
};

#[derive(Parser, Debug)]
#[command(name = "deskpair")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Delete expired desktop sessions once and exit
    Cleanup,
    /// Pair this machine with a web session on a running server
    Pair {
        /// Base URL of the deskpair server
        #[arg(long)]
        server: String,

        /// Web session access token
        #[arg(long)]
        access_token: String,

        /// Desktop application identifier
        #[arg(long)]
        app_id: Option<String>,

        /// Print the callback URL instead of opening it
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskpair=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load_with_env(&args.config)?;
    tracing::info!("Configuration loaded");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Cleanup => cleanup_once(config).await,
        Command::Pair {
            server,
            access_token,
            app_id,
            no_open,
        } => pair(config, server, access_token, app_id, no_open).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    config.validate()?;
    let codec = TokenCodec::new(config.signing_secret()?);

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories and services
    let session_repo = SqlxDesktopSessionRepository::boxed(pool.clone());
    let identity = RemoteIdentityProvider::from_config(&config.identity)?.boxed();

    let issuance = Arc::new(IssuanceService::new(
        identity.clone(),
        codec.clone(),
        session_repo.clone(),
    ));
    let verification = Arc::new(VerificationService::new(codec, session_repo.clone()));
    let sessions = Arc::new(DesktopSessionService::new(session_repo));

    // Start expired session cleanup
    cleanup::spawn(
        sessions.clone(),
        Duration::from_secs(config.cleanup.interval_seconds),
    );

    let state = AppState {
        identity,
        issuance,
        verification,
        sessions,
    };

    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn cleanup_once(config: Config) -> Result<()> {
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let sessions = DesktopSessionService::new(SqlxDesktopSessionRepository::boxed(pool));
    let removed = sessions.cleanup_expired(chrono::Utc::now()).await?;
    println!("Deleted {} expired desktop session(s)", removed);

    Ok(())
}

async fn pair(
    config: Config,
    server: String,
    access_token: String,
    app_id: Option<String>,
    no_open: bool,
) -> Result<()> {
    let client = DesktopAuthClient::new(server)?;
    let mut flow = PairingFlow::start(
        app_id.as_deref(),
        config.pairing.scheme.clone(),
        Some(access_token),
    );

    let channel: Box<dyn DeliveryChannel> = if no_open {
        Box::new(RecordingChannel::new())
    } else {
        Box::new(SystemUriOpener::new())
    };

    match flow.issue(&client, channel.as_ref()).await? {
        PairingState::Delivered(delivery) => {
            println!("Desktop token issued for '{}'", delivery.app_id);
            println!("Expires at: {}", delivery.expires_at.to_rfc3339());
            println!("Callback URL: {}", delivery.callback_url);
            println!();
            println!("Token: {}", delivery.token_preview());
            println!();
            println!("If the app did not open, copy this token into it:");
            println!("{}", delivery.manual_copy_token());
            Ok(())
        }
        PairingState::Failed(failure) => {
            anyhow::bail!("{} ({})", failure.message, failure.code)
        }
        other => anyhow::bail!("Pairing stopped in unexpected state: {:?}", other),
    }
}
