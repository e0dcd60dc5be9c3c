use std::net::SocketAddr;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tracing_subscriber::EnvFilter;

use gatepass::config::Config;
use gatepass::crypto::MasterKey;
use gatepass::db::{self, AppState, queries};
use gatepass::handlers;
use gatepass::messaging::BotClient;
use gatepass::models::CreateTenant;

#[derive(Parser)]
#[command(name = "gatepass", version, about = "Paid channel access service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Purge used and expired linking codes
    Sweep,
    /// Create a tenant and print its API key
    CreateTenant {
        #[arg(long)]
        name: String,
        #[arg(long)]
        notify_url: Option<String>,
        /// Payment-webhook signing secret, stored encrypted
        #[arg(long)]
        webhook_secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sweep => sweep(config),
        Command::CreateTenant {
            name,
            notify_url,
            webhook_secret,
        } => create_tenant(config, name, notify_url, webhook_secret),
    }
}

fn master_key(config: &Config) -> anyhow::Result<MasterKey> {
    match &config.master_key {
        Some(encoded) => MasterKey::from_base64(encoded).context("invalid MASTER_KEY"),
        None if config.dev_mode => {
            tracing::warn!("MASTER_KEY not set; using an ephemeral key (dev mode)");
            Ok(MasterKey::generate())
        }
        None => bail!("MASTER_KEY is required outside dev mode"),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let master_key = master_key(&config)?;
    if config.bot_token.is_empty() {
        bail!("BOT_TOKEN is required to serve");
    }

    let pool = db::open_pool(&config.database_path)?;
    let state = AppState {
        db: pool,
        master_key,
        bot: BotClient::new(&config.bot_api_base, &config.bot_token),
        bulk_delay_ms: config.bulk_delivery_delay_ms,
    };

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10)
        .burst_size(30)
        .finish()
        .expect("valid governor configuration");

    let app = handlers::app(state).layer(GovernorLayer::new(governor_conf));

    let addr = config.addr();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn sweep(config: Config) -> anyhow::Result<()> {
    let pool = db::open_pool(&config.database_path)?;
    let conn = pool.get()?;
    let purged = queries::cleanup_expired_linking_codes(&conn)?;
    tracing::info!("purged {} linking code(s)", purged);
    println!("purged {purged} linking code(s)");
    Ok(())
}

fn create_tenant(
    config: Config,
    name: String,
    notify_url: Option<String>,
    webhook_secret: Option<String>,
) -> anyhow::Result<()> {
    let master_key = master_key(&config)?;
    let pool = db::open_pool(&config.database_path)?;
    let conn = pool.get()?;

    let (tenant, api_key) = queries::create_tenant(
        &conn,
        &CreateTenant {
            name,
            notify_url,
            webhook_secret,
        },
        &master_key,
    )?;

    println!("tenant id: {}", tenant.id);
    println!("api key:   {api_key}");
    println!("(the API key is not stored; save it now)");
    Ok(())
}
