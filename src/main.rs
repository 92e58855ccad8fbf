use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use funnel::auth::TokenGenerator;
use funnel::config::ServerConfig;
use funnel::server::{AppState, create_router};
use funnel::store::{SqliteStore, Store};
use funnel::types::{Principal, Token};

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "funnel")]
#[command(about = "A lightweight CRM server for customers and sales leads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the server (create the database)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// Manage principals (the owning accounts customers are scoped to)
    Principal {
        #[command(subcommand)]
        command: PrincipalCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
enum PrincipalCommands {
    /// Create a principal and issue an access token for it
    Create {
        /// Unique name for the principal
        #[arg(long)]
        name: String,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let db_path = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    }
    .db_path();

    if !db_path.exists() {
        bail!("Server not initialized. Run 'funnel init' first to create the database.");
    }

    Ok(SqliteStore::new(&db_path)?)
}

fn run_init(data_dir: String) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("funnel.db");
    if db_path.exists() {
        bail!("Server already initialized at: {}", db_path.display());
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!("Database created at: {}", db_path.display());
    println!("Create an account with 'funnel principal create --name <name>'.");

    Ok(())
}

fn run_principal_create(name: String, data_dir: String) -> anyhow::Result<()> {
    let store = open_store(&data_dir)?;

    if store.get_principal_by_name(&name)?.is_some() {
        bail!("Principal '{name}' already exists");
    }

    let now = Utc::now();
    let principal = Principal {
        id: Uuid::new_v4().to_string(),
        name: name.clone(),
        created_at: now,
        updated_at: now,
    };
    store.create_principal(&principal)?;

    let generator = TokenGenerator::new();
    let (raw_token, lookup, hash) = generator.generate()?;
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        principal_id: principal.id.clone(),
        created_at: now,
        expires_at: None,
        last_used_at: None,
    };
    store.create_token(&token)?;

    let token_file = std::path::PathBuf::from(&data_dir).join(format!(".{name}_token"));
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!("Principal ID: {}", principal.id);
    println!();
    println!("========================================");
    println!("Token for '{name}' (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("funnel=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            run_init(data_dir)?;
        }
        Commands::Principal { command } => match command {
            PrincipalCommands::Create { name, data_dir } => {
                run_principal_create(name, data_dir)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.clone().into(),
            };

            let store = open_store(&data_dir)?;

            let state = Arc::new(AppState {
                store: Arc::new(store),
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
