//! Step-based wizard flows for connecting an Obihai device.
//!
//! Two flows share one result shape: the setup flow creates a configuration
//! entry, the options flow edits an existing one. Both gate every mutation
//! behind the credential check, so no partial writes can occur.

use crate::{
    entry_store::{ConfigEntry, EntryStore, StoreOutcome},
    obihai_client::{DEFAULT_PASSWORD, DEFAULT_USERNAME, DeviceCredentials, ObihaiClient},
};
use anyhow::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::collections::HashMap;

pub const STEP_USER: &str = "user";
pub const STEP_IMPORT: &str = "import";
pub const STEP_INIT: &str = "init";

pub const ERROR_CANNOT_CONNECT: &str = "cannot_connect";
pub const ERROR_ALREADY_CONFIGURED: &str = "already_configured";

/// Sentinel key for errors not attached to a single field
pub const FIELD_BASE: &str = "base";
pub const FIELD_HOST: &str = "host";

/// Field name (or `base`) mapped to an error code, discarded each step
pub type ErrorMap = HashMap<&'static str, &'static str>;

/// Submitted form values. Username and password fall back to the device
/// factory defaults; `name` is only honored where a step titles by name.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct FlowInput {
    #[validate(min_length = 1)]
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

impl FlowInput {
    pub fn credentials(&self) -> DeviceCredentials {
        DeviceCredentials {
            host: self.host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn title(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.host.clone())
    }
}

/// Outcome of one wizard step
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Redisplay the step with suggested values and per-field errors
    Form {
        step_id: &'static str,
        suggested: DeviceCredentials,
        errors: ErrorMap,
    },
    /// Terminal success: the created or updated configuration entry
    Entry(ConfigEntry),
    /// Terminal failure without a retry path
    Abort { reason: &'static str },
}

impl FlowResult {
    fn form(step_id: &'static str, suggested: DeviceCredentials, errors: ErrorMap) -> Self {
        FlowResult::Form {
            step_id,
            suggested,
            errors,
        }
    }
}

/// Flow creating a new configuration entry
pub struct SetupFlow;

impl SetupFlow {
    /// Interactive step: no input renders the empty form, input is checked
    /// for a duplicate host and validated against the device.
    pub async fn step_user<T>(
        device_client: &T,
        store: &EntryStore,
        input: Option<FlowInput>,
    ) -> Result<FlowResult>
    where
        T: ObihaiClient,
    {
        let Some(input) = input else {
            return Ok(FlowResult::form(
                STEP_USER,
                DeviceCredentials::defaults(),
                ErrorMap::new(),
            ));
        };

        let creds = input.credentials();

        // a duplicate host aborts before any validation is attempted
        if store.host_exists(&creds.host, None)? {
            debug!("setup rejected: {} is already configured", creds.host);
            return Ok(FlowResult::Abort {
                reason: ERROR_ALREADY_CONFIGURED,
            });
        }

        if device_client.check_account(creds.clone()).await {
            // a concurrent flow may have claimed the host while the
            // validator ran; the store re-checks under its lock
            return Ok(match store.create(creds.host.clone(), creds)? {
                StoreOutcome::Stored(entry) => {
                    info!("created configuration entry for {}", entry.data.host);
                    FlowResult::Entry(entry)
                }
                StoreOutcome::DuplicateHost => FlowResult::Abort {
                    reason: ERROR_ALREADY_CONFIGURED,
                },
            });
        }

        Ok(FlowResult::form(
            STEP_USER,
            creds,
            ErrorMap::from([(FIELD_BASE, ERROR_CANNOT_CONNECT)]),
        ))
    }

    // DEPRECATED: legacy static-configuration path. Non-interactive, so a
    // failed validation aborts instead of redisplaying the form.
    pub async fn step_import<T>(
        device_client: &T,
        store: &EntryStore,
        config: FlowInput,
    ) -> Result<FlowResult>
    where
        T: ObihaiClient,
    {
        let creds = config.credentials();

        if store.host_exists(&creds.host, None)? {
            debug!("import rejected: {} is already configured", creds.host);
            return Ok(FlowResult::Abort {
                reason: ERROR_ALREADY_CONFIGURED,
            });
        }

        if device_client.check_account(creds.clone()).await {
            return Ok(match store.create(config.title(), creds)? {
                StoreOutcome::Stored(entry) => {
                    info!("imported configuration entry for {}", entry.data.host);
                    FlowResult::Entry(entry)
                }
                StoreOutcome::DuplicateHost => FlowResult::Abort {
                    reason: ERROR_ALREADY_CONFIGURED,
                },
            });
        }

        Ok(FlowResult::Abort {
            reason: ERROR_CANNOT_CONNECT,
        })
    }
}

/// Flow editing an existing configuration entry
pub struct OptionsFlow;

impl OptionsFlow {
    /// No input pre-fills the form from the stored entry. Input is checked
    /// for a host collision with the other entries, then validated; errors
    /// redisplay with the submitted values retained.
    pub async fn step_init<T>(
        device_client: &T,
        store: &EntryStore,
        entry: &ConfigEntry,
        input: Option<FlowInput>,
    ) -> Result<FlowResult>
    where
        T: ObihaiClient,
    {
        let Some(input) = input else {
            return Ok(FlowResult::form(
                STEP_INIT,
                entry.data.clone(),
                ErrorMap::new(),
            ));
        };

        let creds = input.credentials();

        if store.host_exists(&creds.host, Some(entry.id))? {
            debug!(
                "options rejected: {} is configured on another entry",
                creds.host
            );
            return Ok(FlowResult::form(
                STEP_INIT,
                creds,
                ErrorMap::from([(FIELD_HOST, ERROR_ALREADY_CONFIGURED)]),
            ));
        }

        if device_client.check_account(creds.clone()).await {
            return Ok(
                match store.update(entry.id, input.title(), creds.clone())? {
                    StoreOutcome::Stored(updated) => {
                        info!("updated configuration entry for {}", updated.data.host);
                        FlowResult::Entry(updated)
                    }
                    StoreOutcome::DuplicateHost => FlowResult::form(
                        STEP_INIT,
                        creds,
                        ErrorMap::from([(FIELD_HOST, ERROR_ALREADY_CONFIGURED)]),
                    ),
                },
            );
        }

        Ok(FlowResult::form(
            STEP_INIT,
            creds,
            ErrorMap::from([(FIELD_BASE, ERROR_CANNOT_CONNECT)]),
        ))
    }
}
