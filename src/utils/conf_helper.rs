use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::extension_model::ExtensionConfig;

static CONFIG_CACHE: OnceLock<ExtensionConfig> = OnceLock::new();
static CORE_URL: OnceLock<String> = OnceLock::new();

pub async fn init_config_and_bind() -> Result<TcpListener> {
    let file_path = "plugin.json";

    let data = fs::read_to_string(file_path)
        .await
        .with_context(|| format!("reading {}", file_path))?;

    let mut config: ExtensionConfig =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", file_path))?;

    // === SERVER SOCKET ===
    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;

    let actual_port = listener.local_addr().context("reading bound address")?.port();

    // === PORT PATCH ===
    // port 0 in the manifest means "pick one", so publish what we actually got
    config.connection.port = actual_port;

    let url = format!(
        "{}:{}",
        config.connection.target, config.connection.target_port
    );

    CORE_URL
        .set(url)
        .map_err(|_| anyhow!("core URL already initialized"))?;

    CONFIG_CACHE
        .set(config)
        .map_err(|_| anyhow!("config already initialized"))?;

    info!("Config initialized with dynamic port: {}", actual_port);

    Ok(listener)
}

pub fn get_cached_config() -> &'static ExtensionConfig {
    CONFIG_CACHE.get().expect("Config not initialized")
}

pub fn get_core_url() -> &'static String {
    CORE_URL.get().expect("Core URL not initialized")
}
