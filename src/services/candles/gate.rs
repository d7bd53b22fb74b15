use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Admission control for calls to the external API.
#[async_trait]
pub trait RateGate {
    /// Resolves once the next call may be issued.
    async fn wait(&self);
}

/// Keeps at least `min_spacing` between consecutive admissions.
///
/// The first call passes immediately. A zero spacing disables the gate.
pub struct IntervalGate {
    min_spacing: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl IntervalGate {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_admitted: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RateGate for IntervalGate {
    async fn wait(&self) {
        if self.min_spacing.is_zero() {
            return;
        }

        let mut last = self.last_admitted.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_spacing;
            if ready_at > Instant::now() {
                debug!("Rate gate holding request for {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
