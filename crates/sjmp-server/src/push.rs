//! Background schema push to a remote registrar.
//!
//! The first push happens after a tenth of the interval, then once per
//! interval, and additionally right after every schema rebuild that wakes
//! subscribers (quiet registrations do not). Failures are logged and never
//! reach the host.

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use sjmp_core::client::{check_result, read_capped};
use sjmp_core::{ClientConfig, ProtocolConfig, Registry, Result, SjmpError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

/// Pushes the registry's schema to one URL.
pub struct SchemaPusher {
    client: Client,
    url: Url,
    registry: Arc<Registry>,
    interval: Duration,
}

impl SchemaPusher {
    pub fn new(registry: Arc<Registry>, url: Url, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(SjmpError::Config {
                message: "schema push interval must be positive".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(ClientConfig::REQUEST_TIMEOUT)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            url,
            registry,
            interval,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST the current schema once and check the registrar's answer.
    pub async fn push_once(&self) -> Result<()> {
        let schema = self.registry.snapshot();
        let mut response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "text/json")
            .body(schema.to_string())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SjmpError::Transport {
                message: format!(
                    "Schema push http status code is not OK but {}",
                    response.status()
                ),
            });
        }

        let body = read_capped(&mut response, ProtocolConfig::MAX_RESPONSE_LENGTH).await?;
        let value: Value = serde_json::from_slice(&body).map_err(|_| SjmpError::Protocol {
            message: "Schema push result is empty".to_string(),
        })?;
        check_result(&value)
    }

    /// Run the push loop until `shutdown` flips or its sender goes away.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!("Starting schema push task for url {}", self.url);
        // Subscribed before the task starts so no rebuild after spawn is lost.
        let schema_rx = self.registry.subscribe();
        tokio::spawn(self.run(schema_rx, shutdown))
    }

    async fn run(
        self,
        mut schema_rx: watch::Receiver<Arc<str>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(Instant::now() + self.interval / 10, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
                changed = schema_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    debug!("Schema changed, pushing immediately");
                }
            }

            if let Err(e) = self.push_once().await {
                warn!("Failed to push schema to {}: {}", self.url, e);
            }
        }
        info!("Schema push task stopped");
    }
}
