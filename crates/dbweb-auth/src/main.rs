use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dbweb_auth::config::{self, ConfigBuilder};
use dbweb_auth::constants::{CRED_PASSWORD, CRED_USER};
use dbweb_auth::observability::init_observability;
use dbweb_auth::{AuthServer, Credentials};

#[derive(Parser, Debug)]
#[command(name = "dbweb-auth")]
#[command(about = "Authentication and access-control core for a database web backend", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,

    /// Administrator created on first start
    #[arg(long)]
    admin_name: Option<String>,

    /// Password of the administrator created on first start
    #[arg(long)]
    admin_password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered authentication providers
    Providers,

    /// List permissions declared by all services
    Permissions,

    /// Log in and print the resulting authentication info
    Login {
        /// Provider id
        #[arg(short, long, default_value = "local")]
        provider: String,

        /// User name (`user` credential)
        #[arg(short, long)]
        user: Option<String>,

        /// Password (`password` credential)
        #[arg(long, env = "DBWEB_LOGIN_PASSWORD")]
        password: Option<String>,

        /// Extra credential as key=value, repeatable
        #[arg(long = "credential", value_parser = parse_credential)]
        credentials: Vec<(String, String)>,
    },
}

fn parse_credential(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // CLI values first; file and environment override them
    let mut builder = ConfigBuilder::new().json_logs(args.json_logs);
    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }
    if let Some(name) = args.admin_name {
        builder = builder.admin_name(name);
    }
    if let Some(password) = args.admin_password {
        builder = builder.admin_password(password);
    }

    let builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path, builder)?
    } else {
        config::load_config_onto(builder)?
    };
    let config = builder.build()?;

    init_observability(&config.telemetry)?;

    let server = AuthServer::in_memory(config)?;
    server.bootstrap().await?;
    tracing::info!(
        server = %server.app_config().server().server_name,
        providers = server.registry().list_providers().len(),
        "Authentication core ready"
    );

    let output = match args.command {
        Command::Providers => serde_json::to_string_pretty(&server.orchestrator().list_providers())?,
        Command::Permissions => {
            serde_json::to_string_pretty(&server.registry().list_permissions_of_all_services())?
        }
        Command::Login {
            provider,
            user,
            password,
            credentials,
        } => {
            let mut presented: Credentials = credentials.into_iter().collect();
            if let Some(user) = user {
                presented.insert(CRED_USER, user);
            }
            if let Some(password) = password {
                presented.insert(CRED_PASSWORD, password);
            }
            let session = server.new_session();
            let info = server
                .orchestrator()
                .login(&session, &provider, presented)
                .await
                .map_err(|e| anyhow::anyhow!("login failed ({}): {e}", e.kind().as_str()))?;
            serde_json::to_string_pretty(info.as_ref())?
        }
    };
    println!("{output}");

    Ok(())
}
