//! Adapters for the services the backend talks to: mail and the payment provider.

pub mod mail;
pub mod mercadopago;
pub mod templates;

use std::sync::Arc;

use anyhow::Result;
use compute::notify::Notifier;
use tracing::info;

use crate::config::SmtpConfig;
use mail::{LogNotifier, SmtpNotifier};

/// SMTP delivery when a host is configured, logging otherwise.
pub fn build_notifier(config: &SmtpConfig) -> Result<Arc<dyn Notifier>> {
    if config.host.trim().is_empty() {
        info!("No SMTP host configured, notifications will only be logged");
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(SmtpNotifier::new(config)?))
}
