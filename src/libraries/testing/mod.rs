//! Shared test utilities

use super::transport::{BoxedSubscription, Delivery, MemoryTransport, Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Polls a condition until it holds, panics if it does not within five seconds
#[macro_export]
macro_rules! eventually {
    ($condition:expr) => {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !$condition {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect(concat!("condition was not met in time: ", stringify!($condition)))
    };
}

/// Routes log output through the test harness, repeated calls are no-ops
pub fn init_logging() {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// In-memory transport whose n-th publish is rejected
pub struct FlakyTransport {
    inner: MemoryTransport,
    failing: u64,
    attempts: AtomicU64,
}

impl FlakyTransport {
    pub fn failing_publish(failing: u64) -> Self {
        Self {
            inner: MemoryTransport::new(),
            failing,
            attempts: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn publish(&self, channel: &str, payload: &str) -> Result<Delivery, TransportError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) + 1 == self.failing {
            return Err(TransportError::PublishFailed {
                channel: channel.to_owned(),
                source: "connection reset".into(),
            });
        }

        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxedSubscription, TransportError> {
        self.inner.subscribe(channel).await
    }
}
