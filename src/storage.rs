pub mod sqlite;

use std::collections::HashMap;

use error_stack::Report;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Settings key holding the alert-count threshold.
pub const ALERT_COUNT_KEY: &str = "alert_value_indicator";

/// Numeric settings that may change between cycles without a restart.
pub trait SettingsProvider: Send + Sync {
    fn number<'a>(&'a self, key: &'a str)
    -> BoxFuture<'a, Result<Option<f64>, Report<StorageError>>>;
}

/// Fixed in-memory settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    values: HashMap<String, f64>,
}

impl StaticSettings {
    #[cfg(test)]
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

impl SettingsProvider for StaticSettings {
    fn number<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<f64>, Report<StorageError>>> {
        let value = self.values.get(key).copied();
        Box::pin(async move { Ok(value) })
    }
}

/// Read the alert-count threshold, falling back to `default` when the store
/// has no usable value or cannot be read.
pub async fn resolve_alert_count(settings: &dyn SettingsProvider, default: usize) -> usize {
    match settings.number(ALERT_COUNT_KEY).await {
        Ok(Some(value)) if value.is_finite() && value >= 1.0 && value.fract() == 0.0 => {
            value as usize
        }
        Ok(Some(value)) => {
            warn!(key = ALERT_COUNT_KEY, value, default, "ignoring invalid setting");
            default
        }
        Ok(None) => {
            debug!(key = ALERT_COUNT_KEY, default, "setting not found, using default");
            default
        }
        Err(e) => {
            warn!(error = ?e, key = ALERT_COUNT_KEY, default, "settings lookup failed, using default");
            default
        }
    }
}
