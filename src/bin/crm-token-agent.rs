use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crm_token_agent::authorize;
use crm_token_agent::config::service::ServiceConfig;
use crm_token_agent::credentials::{CredentialRecord, Expiring};
use crm_token_agent::exchange::HttpExchangeClient;
use crm_token_agent::helpers::time::{get_token_safety_margin, now};
use crm_token_agent::lifecycle::LifecycleManager;
use crm_token_agent::resilience::retry::RetrySettings;
use crm_token_agent::resolver::{CredentialResolver, TokenScope};
use crm_token_agent::server;
use crm_token_agent::store::FileStore;
use crm_token_agent::utils::config_loader;
use crm_token_agent::utils::logging;
use crm_token_agent::utils::logging::LogLevel;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "crm-token-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the consent flow and store the company credential
    Authorize {
        /// Skip the redirect listener and exchange this code directly
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Print a valid access token
    Token {
        #[arg(short, long)]
        location: Option<String>,
        /// Re-derive the location token even if the cached one is still valid
        #[arg(long)]
        force: bool,
    },
    /// List stored credentials and their expiry
    Status,
    /// Forget every stored credential
    Logout,
    /// Serve tokens over HTTP
    Serve,
}

type Manager = LifecycleManager<FileStore, HttpExchangeClient>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let service_config = config_loader::run(&args.config).await?;
    logging::run(Some(&service_config), args.log_level);

    // -------------------------------
    // 2. Token store + exchange client -> lifecycle manager
    // -------------------------------

    let manager = open_manager(&service_config).await?;

    // -------------------------------
    // 3. Run the command
    // -------------------------------

    match args.command {
        Command::Authorize { code, timeout_secs } => {
            run_authorize(&service_config, &manager, code, Duration::from_secs(timeout_secs)).await
        }
        Command::Token { location, force } => {
            let resolver = CredentialResolver::new(manager);
            let scope = TokenScope::from_location(location);
            let retry = RetrySettings::from_config(service_config.settings.retry.as_ref());
            let (resolver, scope) = (&resolver, &scope);
            let token = retry
                .run_with_retry(|| async move {
                    if force {
                        resolver.renew_token_for(scope).await
                    } else {
                        resolver.token_for(scope).await
                    }
                })
                .await
                .with_context(|| format!("cannot resolve {} token", scope))?;
            println!("{}", token);
            Ok(())
        }
        Command::Status => {
            print_status(&manager).await;
            Ok(())
        }
        Command::Logout => {
            manager.deauthorize().await?;
            println!("all credentials removed");
            Ok(())
        }
        Command::Serve => {
            info!("service starting...");
            server::start(&service_config.settings, CredentialResolver::new(manager)).await
        }
    }
}

async fn open_manager(service_config: &ServiceConfig) -> Result<Manager> {
    let store = FileStore::new(&service_config.store.path);
    let client = HttpExchangeClient::new(service_config.oauth.clone())
        .context("cannot build http client")?;
    let safety_margin = get_token_safety_margin(Some(service_config.settings.safety_margin_seconds));

    LifecycleManager::open(store, client, safety_margin)
        .await
        .with_context(|| format!("cannot load token store '{}'", service_config.store.path))
}

async fn run_authorize(
    service_config: &ServiceConfig,
    manager: &Manager,
    code: Option<String>,
    timeout: Duration,
) -> Result<()> {
    let oauth = &service_config.oauth;
    let code = match code {
        Some(code) => code,
        None => {
            let state = authorize::generate_state();
            let url = authorize::authorize_url(oauth, &state)?;
            println!("Open this URL in a browser to authorize the app:\n\n  {}\n", url);
            authorize::wait_for_code(&oauth.redirect_uri, &state, timeout).await?
        }
    };

    let credential = manager.authorize_with_code(&code, &oauth.redirect_uri).await?;
    println!(
        "authorized company {} (token valid until {})",
        credential.company_id,
        credential.expires_at.to_rfc3339()
    );
    Ok(())
}

async fn print_status(manager: &Manager) {
    let state = manager.snapshot().await;
    if state.is_empty() {
        println!("no credentials stored; run `authorize` first");
        return;
    }

    let now = now();
    let margin = manager.safety_margin();
    for record in state.records() {
        let tier = match &record {
            CredentialRecord::Company(_) => "company",
            CredentialRecord::Location(_) => "location",
        };
        println!(
            "{:<9} {:<28} expires {} ({}s left){}",
            tier,
            record.label(),
            record.expires_at().to_rfc3339(),
            record.seconds_left(now),
            if record.is_fresh(now, margin) { "" } else { " stale" }
        );
    }
}
