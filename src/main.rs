use std::{path::Path, sync::Arc};

use citypop::{
    CityService, ElasticsearchStore, GracefulShutdown, InMemoryStore,
    adapters::router,
    config::{AppConfig, AppConfigValidator, StoreBackend, load_config},
    metrics,
    ports::CityStore,
    tracing_setup,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Optional configuration file; environment variables override it
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration (file + environment) and print a summary
    Validate {
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Write a starter .env file
    Init {
        /// Output path for the new env file
        #[clap(short, long, default_value = ".env")]
        output: String,
    },
    /// Start the HTTP server (default)
    Serve {
        #[clap(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Local development convenience; absence of .env is normal
    let dotenv_loaded = dotenvy::dotenv().ok();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(config.or(args.config)),
        Some(Commands::Init { output }) => init_env_command(&output).await,
        Some(Commands::Serve { config }) => serve(config.or(args.config), dotenv_loaded).await,
        None => serve(args.config, dotenv_loaded).await,
    }
}

fn create_store(config: &AppConfig) -> Arc<dyn CityStore> {
    match config.store_backend {
        StoreBackend::Elasticsearch => {
            Arc::new(ElasticsearchStore::new(config.elasticsearch()))
        }
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
    }
}

async fn serve(
    config_path: Option<String>,
    dotenv_loaded: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_setup::init_from_config(&config)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    if let Some(path) = dotenv_loaded {
        tracing::info!("Loaded environment from {}", path.display());
    }

    AppConfigValidator::validate(&config).map_err(|e| eyre!("{}", e))?;

    tracing::info!(
        app = %config.app_name,
        version = %config.app_version,
        store = %config.store_backend,
        "Starting application..."
    );

    if config.elasticsearch_user.is_some() && !config.elasticsearch_basic_auth {
        tracing::warn!(
            "ELASTICSEARCH_USER is set but ELASTICSEARCH_BASIC_AUTH is false; credentials are not sent"
        );
    }

    let store = create_store(&config);
    store
        .connect()
        .await
        .wrap_err_with(|| format!("Failed to connect to {} store", store.backend_name()))?;
    tracing::info!("Document store connection established");

    let app = router(CityService::new(store.clone()));

    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind to address {listen_addr}"))?;

    let graceful_shutdown = GracefulShutdown::new();
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    tracing::info!("{} listening on {}", config.app_name, listen_addr);

    let server_shutdown = graceful_shutdown.clone();
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = server_shutdown.wait_for_shutdown_signal().await;
            tracing::info!("Shutdown signal received: {:?}", reason);
        })
        .await
        .context("Server error");

    tracing::info!("Shutting down application...");
    if let Err(e) = store.close().await {
        tracing::error!("Failed to close store connection: {}", e);
    }

    tracing::info!("Graceful shutdown completed");
    tracing_setup::shutdown_tracing();

    server_result
}

/// Validate configuration and exit
fn validate_config_command(config_path: Option<String>) -> Result<()> {
    match &config_path {
        Some(path) => println!("🔍 Validating configuration: {path} + environment"),
        None => println!("🔍 Validating configuration from environment"),
    }

    let config = match load_config(config_path.as_deref()) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match AppConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Application: {} {}", config.app_name, config.app_version);
            println!("   • Listen Address: {}", config.listen_addr());
            println!("   • Store Backend: {}", config.store_backend);
            if config.store_backend == StoreBackend::Elasticsearch {
                println!("   • Elasticsearch: {}", config.elasticsearch_host);
                println!("   • Index: {}", config.elasticsearch_index);
                println!("   • Basic Auth: {}", config.elasticsearch_basic_auth);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Write a starter .env file
async fn init_env_command(output: &str) -> Result<()> {
    let path = Path::new(output);
    if path.exists() {
        eprintln!("❌ Error: '{output}' already exists");
        std::process::exit(1);
    }

    let default_env = r#"# citypop configuration

APP_NAME=city-population-api
APP_VERSION=1.0.0
DEBUG=false

HOST=0.0.0.0
PORT=8000

# elasticsearch | memory
STORE_BACKEND=elasticsearch
ELASTICSEARCH_HOST=http://localhost:9200
ELASTICSEARCH_INDEX=cities
ELASTICSEARCH_TIMEOUT_SECS=30
ELASTICSEARCH_MAX_RETRIES=3

# Credentials are only sent when ELASTICSEARCH_BASIC_AUTH=true
# ELASTICSEARCH_USER=elastic
# ELASTICSEARCH_PASSWORD=changeme
ELASTICSEARCH_BASIC_AUTH=false
"#;

    tokio::fs::write(path, default_env)
        .await
        .context("Failed to write env file")?;
    println!("✅ Created starter configuration at: {output}");
    println!("   Run 'citypop serve' from the same directory to start the server");
    Ok(())
}
