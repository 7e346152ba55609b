use async_trait::async_trait;

use crate::LOG_TARGET;

/// Best-effort notification hook fired when a batch job finishes.
///
/// Implementations must not block the batch worker for long; a webhook or
/// email send belongs on the caller's side of this trait, not inside it.
#[async_trait]
pub trait NotificationHook: Send + Sync {
	async fn send_batch_complete(&self, email: &str, batch_id: &str, processed_count: u64);
}

/// Default hook: logs the notification instead of delivering it. Suitable
/// for tests and for deployments that don't need batch-complete callbacks.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationHook for NoopNotifier {
	async fn send_batch_complete(&self, email: &str, batch_id: &str, processed_count: u64) {
		log::debug!(
			target: LOG_TARGET,
			"batch complete notification (no-op hook): email={email} batch_id={batch_id} processed={processed_count}"
		);
	}
}
