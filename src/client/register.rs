use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::utils::conf_helper;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Serialize)]
pub struct HealthPayload {
    pub id: String,
    pub timestamp: f64,
}

pub async fn start_heartbeat() {
    let config = conf_helper::get_cached_config();
    let core_url = conf_helper::get_core_url();

    let heartbeat_url = format!("http://{}/heartbeat", core_url);
    let client = Client::new();

    info!("Heartbeat worker started for ID: {}", config.id);

    loop {
        let payload = HealthPayload {
            id: config.id.clone(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        };

        let result = client.post(&heartbeat_url).json(&payload).send().await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!("Heartbeat sent successfully");
            }
            Ok(resp) => error!("Heartbeat server error: {}", resp.status()),
            Err(e) => error!("Heartbeat network error: {}", e),
        }

        sleep(HEARTBEAT_INTERVAL).await;
    }
}

pub async fn register() -> Result<()> {
    let config = conf_helper::get_cached_config();
    let core_url = conf_helper::get_core_url();

    let register_url = format!("http://{}/register", core_url);
    let client = Client::new();

    info!("Registering to Plotune Core: {}", register_url);

    client
        .post(&register_url)
        .json(config)
        .send()
        .await
        .context("registration request failed")?
        .error_for_status()
        .context("registration rejected by core")?;

    info!("Successfully registered to Plotune Core!");
    Ok(())
}
