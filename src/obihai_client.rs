use crate::config::AppConfig;
use anyhow::{Context, Result};
use log::{debug, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trait_variant::make;

/// Factory default credentials of Obihai devices
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

/// Host/username/password triple identifying one Obihai device
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DeviceCredentials {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl DeviceCredentials {
    /// Credentials suggested for an empty setup form
    pub fn defaults() -> Self {
        DeviceCredentials {
            host: String::new(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Boolean-returning connectivity and auth check against the device.
///
/// The check is contracted to never fail: transport errors, timeouts and
/// rejected credentials all collapse to `false`.
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait ObihaiClient {
    async fn check_account(&self, creds: DeviceCredentials) -> bool;
}

#[derive(Clone)]
pub struct ObihaiHttpClient {
    probe_timeout: Duration,
}

impl ObihaiHttpClient {
    // Device status page, reachable with basic auth on stock firmware
    const STATUS_PAGE: &str = "DI_S_.xml";

    pub fn new() -> Self {
        ObihaiHttpClient {
            probe_timeout: AppConfig::get().device.probe_timeout,
        }
    }

    fn probe(creds: &DeviceCredentials, probe_timeout: Duration) -> Result<bool> {
        let client = reqwest::blocking::Client::builder()
            .timeout(probe_timeout)
            .build()
            .context("failed to build probe client")?;

        let url = format!("http://{}/{}", creds.host, Self::STATUS_PAGE);

        let response = client
            .get(&url)
            .basic_auth(&creds.username, Some(&creds.password))
            .send()
            .context("failed to reach device")?;

        debug!("probe of {url} returned {}", response.status());

        Ok(response.status().is_success())
    }
}

impl ObihaiClient for ObihaiHttpClient {
    async fn check_account(&self, creds: DeviceCredentials) -> bool {
        let probe_timeout = self.probe_timeout;

        match tokio::task::spawn_blocking(move || Self::probe(&creds, probe_timeout)).await {
            Ok(Ok(authenticated)) => authenticated,
            Ok(Err(e)) => {
                warn!("credential check failed: {e:#}");
                false
            }
            Err(e) => {
                warn!("credential check task failed: {e:#}");
                false
            }
        }
    }
}
