//! Operator-facing log blocks about the payment recipient and incoming payments.
//!
//! Every message goes through a [`LogSink`]. The server uses [`TracingSink`], which turns
//! each line into a `tracing` event.

use std::fmt;
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

use crate::access_log::RequestLogEntry;
use crate::explorer::{explorer_url, transaction_url};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(level)
    }
}

/// Destination of log lines. Shared across concurrent requests.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Emits every line as a `tracing` event of the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Keeps lines in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages only, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, message)| message).collect()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push((level, message.to_string()));
    }
}

/// Facts about a paid request, as logged once the payment is accepted.
#[derive(Debug, Clone, Copy)]
pub struct PaymentRequestLog<'a> {
    pub client_ip: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub recipient: &'a str,
    pub price: &'a str,
    pub network: &'a str,
}

/// Formats payment events and writes them to a sink.
#[derive(Clone)]
pub struct PaymentTracker {
    sink: Arc<dyn LogSink>,
}

impl Default for PaymentTracker {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl fmt::Debug for PaymentTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentTracker").finish_non_exhaustive()
    }
}

impl PaymentTracker {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn log(&self, message: impl AsRef<str>, level: LogLevel) {
        self.sink.log(level, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(message, LogLevel::Info);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(message, LogLevel::Warn);
    }

    fn rule(&self) {
        self.info("=".repeat(RULE_WIDTH));
    }

    /// Announces where payments go.
    ///
    /// A missing or empty address yields a single warning and nothing else.
    pub fn log_payment_info(&self, address: Option<&str>, network: &str) {
        let Some(address) = address.filter(|address| !address.is_empty()) else {
            self.warn("WARNING: WALLET_ADDRESS is not configured, payments cannot be received!");
            return;
        };

        self.rule();
        self.info("PAYMENT RECIPIENT WALLET");
        self.rule();
        self.info(format!("Wallet address: {address}"));
        self.info(format!("Network: {network}"));
        self.info(format!(
            "View on block explorer: {}",
            explorer_url(address, network)
        ));
        self.rule();
        self.info("");
    }

    pub fn log_payment_request(&self, request: &PaymentRequestLog<'_>) {
        self.rule();
        self.info("PAYMENT REQUEST");
        self.rule();
        self.info(format!("Client IP: {}", request.client_ip));
        self.info(format!("Recipient wallet: {}", request.recipient));
        self.info(format!("Price: {}", request.price));
        self.info(format!("Network: {}", request.network));
        self.info(format!("Endpoint: {} {}", request.method, request.path));
        self.rule();
    }

    /// Lines emitted once access is granted.
    pub fn log_payment_success(&self, recipient: &str, network: &str) {
        self.info("Payment successful, redirecting to video content");
        self.info(format!("Funds sent to: {recipient}"));
        self.info(format!(
            "View transactions on: {}",
            explorer_url(recipient, network)
        ));
    }

    /// Reports the on-chain transaction of a settled payment.
    pub fn log_payment_settled(&self, payer: &str, tx_hash: &str, network: &str) {
        self.info(format!("Payment from {payer} settled on {network}"));
        self.info(format!(
            "View transaction: {}",
            transaction_url(tx_hash, network)
        ));
    }

    pub fn log_request_received(&self, method: &str, path: &str) {
        self.info(format!("{method} {path}"));
    }

    pub fn log_request_completed(&self, entry: &RequestLogEntry) {
        let status = entry
            .status
            .map(|status| status.as_u16().to_string())
            .unwrap_or_else(|| "-".to_string());
        let duration_ms = entry.duration_ms.unwrap_or_default();
        self.info(format!(
            "{} {} - {} ({}ms)",
            entry.method, entry.path, status, duration_ms
        ));
    }
}
