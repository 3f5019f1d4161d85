use std::sync::Arc;

use clap::Parser;
use error_stack::{Report, ResultExt};
use filigree::tracing_config::{
    configure_tracing, create_tracing_config, teardown_tracing, TracingProvider,
};

use crate::{
    config::{find_configs, FileConfig, ServerConfig},
    database::init_database,
    remote::{HttpAuthBridge, HttpPropertyStore},
    server::{self, ServerBind},
    Error,
};

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// The path to the configuration file or a directory containing it. If omitted,
    /// the default configuration paths will be checked.
    #[clap(long, short = 'c')]
    config: Option<String>,

    /// Do not read the .env file
    #[clap(long)]
    no_dotenv: bool,

    /// The runtime environment. "development" enables debugging aids.
    #[clap(long, env = "IDENTITY_ENV", default_value_t = String::from("development"))]
    env: String,

    /// The SQLite database path, or `sqlite::memory:` for a database that lives only as long
    /// as the process.
    #[clap(long = "db", env = "DATABASE_URL")]
    database: Option<String>,

    /// The IP host to bind to
    #[clap(long, env = "HOST")]
    host: Option<String>,

    /// The TCP port to listen on
    #[clap(long, env = "PORT")]
    port: Option<u16>,

    /// Base URL of the auth bridge
    #[clap(long, env = "BRIDGE_URL")]
    bridge_url: Option<String>,

    /// Base URL of the property store
    #[clap(long, env = "STORAGE_URL")]
    storage_url: Option<String>,

    /// Request timeout, in seconds
    #[clap(long, env = "REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Timeout for calls to the bridge and the property store, in seconds
    #[clap(long, env = "REMOTE_TIMEOUT")]
    remote_timeout: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            database: self.database.clone(),
            host: self.host.clone(),
            port: self.port,
            bridge_url: self.bridge_url.clone(),
            storage_url: self.storage_url.clone(),
            request_timeout: self.request_timeout,
            remote_timeout: self.remote_timeout,
            dotenv: None,
        }
    }
}

pub async fn run(mut cmd: Cli) -> Result<(), Report<Error>> {
    error_stack::Report::set_color_mode(error_stack::fmt::ColorMode::None);

    let configs = find_configs(cmd.config.clone())?;
    let mut file_config = configs.merged();

    // Must load configs and run dotenv before starting tracing, so that they can set destination
    // and service name.
    if !cmd.no_dotenv {
        let mut loaded_env = false;
        for (dir, config) in configs.cwd.iter().rev() {
            if config.dotenv.unwrap_or(true) {
                loaded_env |= dotenvy::from_path(dir.join(".env")).is_ok();
            }
        }

        if file_config.dotenv.unwrap_or(true) {
            loaded_env |= dotenvy::dotenv().is_ok();
        }

        if loaded_env {
            // Reread with the environment variables in place
            cmd = Cli::parse();
        }
    }

    file_config.merge(cmd.overrides());

    let tracing_config = create_tracing_config(
        "",
        "IDENTITY_",
        TracingProvider::None,
        Some("identity".to_string()),
        None,
    )
    .change_context(Error::ServerStart)?;

    configure_tracing(
        "IDENTITY_",
        tracing_config,
        tracing_subscriber::fmt::time::ChronoUtc::rfc_3339(),
        std::io::stdout,
    )
    .change_context(Error::ServerStart)?;

    for (dir, _) in configs.iter() {
        tracing::info!("Loaded config from {}", dir.display());
    }

    let server_config = ServerConfig::resolve(file_config)?;
    let db = init_database(&server_config.database, server_config.lock_timeout()).await?;

    let http_client = reqwest::Client::builder()
        .user_agent("identity-server")
        .timeout(server_config.remote_timeout)
        .build()
        .change_context(Error::ServerStart)?;

    let server = server::create_server(server::Config {
        env: cmd.env,
        bind: ServerBind::HostPort(server_config.host, server_config.port),
        request_timeout: server_config.request_timeout,
        db,
        bridge: Arc::new(HttpAuthBridge::new(
            http_client.clone(),
            server_config.bridge_url.as_str(),
        )),
        storage: Arc::new(HttpPropertyStore::new(
            http_client,
            server_config.storage_url.as_str(),
        )),
    })
    .await?;

    server.run().await?;

    tracing::info!("Exporting remaining traces");
    teardown_tracing().await.change_context(Error::Shutdown)?;
    tracing::info!("Trace shut down complete");

    Ok(())
}

pub async fn actual_main() -> Result<(), Report<Error>> {
    let cli = Cli::parse();
    run(cli).await
}
