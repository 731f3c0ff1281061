//! Teller - terminal front end for the Teller session core.
//!
//! Stands in for the mobile navigation layer: it runs the startup bootstrap
//! and routes to the signed-in or signed-out view, and exposes login,
//! logout and status commands against the same session store.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use teller_core::api::ApiClient;
use teller_core::auth::{
    AuthDecision, Bootstrap, ClaimsDecoder, Persistence, SessionStore, TokenLifecycle,
    TokenStatus, UnverifiedDecoder,
};
use teller_core::Config;

const USAGE: &str = "\
Usage: teller [COMMAND]

Commands:
  bootstrap             Restore the saved session (default)
  login <access-token>  Sign in with a token pair (refresh token is prompted)
  logout                Sign out and forget saved tokens
  status                Show the saved session without refreshing it
  help                  Show this message";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

struct Core {
    store: SessionStore,
    lifecycle: TokenLifecycle<ApiClient>,
    decoder: Arc<dyn ClaimsDecoder>,
}

impl Core {
    fn new(config: &Config) -> Result<Self> {
        let storage = config.open_storage().context("Failed to open token storage")?;
        let decoder: Arc<dyn ClaimsDecoder> = Arc::new(UnverifiedDecoder);
        let api = ApiClient::from_config(config).context("Failed to create API client")?;

        Ok(Self {
            store: SessionStore::new(storage, decoder.clone()),
            lifecycle: TokenLifecycle::new(decoder.clone(), api)
                .with_threshold(config.refresh_threshold())
                .with_timeout(config.request_timeout()),
            decoder,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("bootstrap");
    if matches!(command, "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()
        .context("Failed to load configuration")?
        .with_env_overrides();
    info!(api = %config.api_base_url, storage = ?config.storage, "Teller starting");

    let core = Core::new(&config)?;

    match command {
        "bootstrap" => bootstrap(&core).await,
        "login" => {
            let access_token = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("login requires an access token\n\n{}", USAGE))?;
            login(&core, access_token).await
        }
        "logout" => {
            core.store.logout().await;
            println!("Signed out.");
            Ok(())
        }
        "status" => status(&core).await,
        other => Err(anyhow::anyhow!("Unknown command: {}\n\n{}", other, USAGE)),
    }
}

async fn bootstrap(core: &Core) -> Result<()> {
    match Bootstrap::new(&core.store, &core.lifecycle).run_now().await {
        AuthDecision::Authenticated { subject_id } => {
            println!("Authenticated as customer {}", subject_id);
        }
        AuthDecision::Unauthenticated => {
            println!("Not signed in. Run `teller login <access-token>` to sign in.");
        }
    }
    Ok(())
}

async fn login(core: &Core, access_token: &str) -> Result<()> {
    let refresh_token = rpassword::prompt_password("Refresh token: ")?;

    match core.store.authenticate(access_token, refresh_token.trim()).await? {
        Persistence::Durable => {}
        Persistence::MemoryOnly(e) => {
            eprintln!("Warning: signed in for this run only, tokens were not saved ({})", e);
        }
    }

    let session = core.store.current();
    if session.subject_id().is_empty() {
        println!("Signed in (token carries no readable customer id).");
    } else {
        println!("Signed in as customer {}", session.subject_id());
    }
    Ok(())
}

async fn status(core: &Core) -> Result<()> {
    let Some(credential) = core.store.hydrate().await? else {
        println!("No saved session.");
        return Ok(());
    };

    let now = chrono::Utc::now();
    match core.decoder.decode(credential.access_token()) {
        Ok(claims) => {
            let state = match core.lifecycle.classify(credential.access_token(), now) {
                TokenStatus::Fresh => "valid",
                TokenStatus::NearExpiry => "expiring soon, will refresh at next start",
                TokenStatus::Expired => "expired",
            };
            println!("Customer:   {}", claims.subject_id);
            println!("Expires at: {}", claims.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Remaining:  {} min ({})", claims.minutes_until_expiry(now), state);
        }
        Err(e) => println!("Saved token is unreadable: {}", e),
    }
    Ok(())
}
