pub mod telegram;

use async_trait::async_trait;
use metrics::counter;
use std::time::Duration;

use crate::error::{truncate_diag, DeliveryError};

pub use telegram::TelegramNotifier;

/// A chat transport that takes one already-sized message at a time.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    /// Something was attempted and nothing got through.
    pub fn all_failed(&self) -> bool {
        self.sent == 0 && self.failed > 0
    }
}

/// Send chunks in order with a fixed pause between them. Failures are logged
/// and counted; the remaining chunks are still attempted.
pub async fn deliver_chunks(
    notifier: &dyn Notifier,
    chunks: &[String],
    pause: Duration,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match notifier.send(chunk).await {
            Ok(()) => {
                report.sent += 1;
                tracing::debug!(
                    target: "notify",
                    transport = notifier.name(),
                    part = i + 1,
                    chars = chunk.chars().count(),
                    "chunk delivered"
                );
            }
            Err(e) => {
                report.failed += 1;
                counter!("digest_delivery_errors_total").increment(1);
                tracing::warn!(
                    target: "notify",
                    transport = notifier.name(),
                    part = i + 1,
                    error = %truncate_diag(&e, 200),
                    "chunk delivery failed"
                );
            }
        }
    }
    tracing::info!(
        target: "notify",
        sent = report.sent,
        failed = report.failed,
        "delivery finished"
    );
    report
}
