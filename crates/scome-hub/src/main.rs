use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scome_core::{
    Flag, FlagStore, HubConfig, PresentationState, ServiceConfig, Tab, DEFAULT_APP_NAMESPACE,
};
use scome_session::{LocalIdentityService, Session, SessionServices, VisitTotal};
use scome_storage::{DeviceFlagStore, SessionFlagStore, SqliteDocumentStore};
use serde::Serialize;
use serde_json::json;
use std::{fs, path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEVICE_DB: &str = "device.sqlite";
const DOCUMENTS_DB: &str = "documents.sqlite";

#[derive(Clone, Debug)]
struct Config {
    hub: HubConfig,
    data_dir: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminReport {
    presentation: PresentationState,
    dashboard: Option<VisitTotal>,
}

#[derive(Parser, Debug)]
#[command(name = "scome-hub")]
#[command(about = "SCOME hub session runner", long_about = None)]
struct Args {
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    #[arg(long, global = true, env = "SCOME_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "SCOME_APP_ID", default_value = DEFAULT_APP_NAMESPACE)]
    app_id: String,
    /// JSON blob with apiKey, authDomain and projectId.
    #[arg(long, global = true, env = "SCOME_SERVICE_CONFIG")]
    service_config: Option<String>,
    #[arg(long, global = true, env = "SCOME_INITIAL_AUTH_TOKEN")]
    token: Option<String>,
    #[arg(long, global = true, env = "SCOME_FALLBACK_VISITS")]
    fallback_visits: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap a session and print the presentation state
    Start {
        #[arg(long, value_parser = parse_tab)]
        tab: Option<Tab>,
    },
    /// Dismiss onboarding for this device
    AckOnboarding,
    /// Clear the onboarding flag so the next start shows it again
    ResetOnboarding,
    /// Open the admin view and unlock it
    Admin {
        #[arg(long)]
        passphrase: String,
    },
    /// Mint a delegated sign-in token for a subject
    IssueToken { subject: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug || env_true("SCOME_HUB_DEBUG"));
    let config = load_config(&args)?;
    debug!(
        event = "config_loaded",
        app_namespace = %config.hub.app_namespace,
        data_dir = %config.data_dir.display(),
        delegated = config.hub.delegated_token.is_some()
    );

    match args.command {
        Command::Start { tab } => {
            let mut session = open_session(&config)?;
            session.start();
            if let Some(tab) = tab {
                session.select_tab(tab);
            }
            session.settle().await;
            print_json(&session.presentation())?;
            session.shutdown();
        }
        Command::AckOnboarding => {
            let mut session = open_session(&config)?;
            session.start();
            session
                .acknowledge_onboarding()
                .context("Failed to persist onboarding flag")?;
            session.settle().await;
            print_json(&session.presentation())?;
            session.shutdown();
        }
        Command::ResetOnboarding => {
            let device = open_device_flags(&config)?;
            device
                .clear(Flag::OnboardingSeen.key())
                .context("Failed to clear onboarding flag")?;
            info!(event = "onboarding_reset");
            print_json(&json!({ "onboardingSeen": false }))?;
        }
        Command::Admin { passphrase } => {
            let mut session = open_session(&config)?;
            session.start();
            session.settle().await;
            session.open_admin_view();
            let dashboard = session.submit_passphrase(&passphrase).await.ok();
            print_json(&AdminReport {
                presentation: session.presentation(),
                dashboard,
            })?;
            session.close_admin_view();
            session.shutdown();
        }
        Command::IssueToken { subject } => {
            let service = LocalIdentityService::new(config.hub.service.api_key.clone());
            println!("{}", service.issue_token(subject.trim()));
        }
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let service = resolve_service_config(args.service_config.as_deref());
    let hub = HubConfig::new(service, args.app_id.trim())
        .with_delegated_token(args.token.clone())
        .with_fallback_visit_total(args.fallback_visits);
    let data_dir = resolve_data_dir(args.data_dir.clone())?;
    Ok(Config { hub, data_dir })
}

fn resolve_service_config(raw: Option<&str>) -> ServiceConfig {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        warn!(event = "service_config_missing", fallback = "mock");
        return ServiceConfig::mock();
    };
    match ServiceConfig::from_json(raw) {
        Ok(config) => config,
        Err(err) => {
            warn!(event = "service_config_invalid", error = %err, fallback = "mock");
            ServiceConfig::mock()
        }
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir,
        None => dirs::data_local_dir()
            .context("No local data directory on this platform; pass --data-dir")?
            .join("scome-hub"),
    };
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

fn open_device_flags(config: &Config) -> Result<DeviceFlagStore> {
    let path = config.data_dir.join(DEVICE_DB);
    DeviceFlagStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

fn open_session(config: &Config) -> Result<Session> {
    let documents_path = config.data_dir.join(DOCUMENTS_DB);
    let documents = SqliteDocumentStore::open(&documents_path)
        .with_context(|| format!("Failed to open {}", documents_path.display()))?;
    let services = SessionServices {
        identity: Arc::new(LocalIdentityService::new(
            config.hub.service.api_key.clone(),
        )),
        documents: Arc::new(documents),
        device_flags: Arc::new(open_device_flags(config)?),
        session_flags: Arc::new(SessionFlagStore::new()),
    };
    Session::new(&config.hub, services).context("Invalid app namespace")
}

fn init_logging(debug: bool) {
    let level = if let Ok(level) = std::env::var("SCOME_LOG_LEVEL") {
        level
    } else if debug {
        "debug".to_string()
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn parse_tab(raw: &str) -> Result<Tab, String> {
    raw.parse()
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}
