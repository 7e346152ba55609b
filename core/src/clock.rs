use std::time::{Duration, Instant, SystemTime};

/// A source of time, injected so tests can control counter windows and
/// deadlines without sleeping.
pub trait Clock: Send + Sync {
	fn now(&self) -> Instant;
	fn system_now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}

	fn system_now(&self) -> SystemTime {
		SystemTime::now()
	}
}

/// A clock that never advances on its own; tests move it forward explicitly.
/// `now()` is anchored at construction and offset by `advance`.
pub struct FixedClock {
	base: Instant,
	base_system: SystemTime,
	offset: std::sync::atomic::AtomicU64,
}

impl FixedClock {
	pub fn new() -> Self {
		FixedClock {
			base: Instant::now(),
			base_system: SystemTime::now(),
			offset: std::sync::atomic::AtomicU64::new(0),
		}
	}

	pub fn advance(&self, d: Duration) {
		self.offset
			.fetch_add(d.as_millis() as u64, std::sync::atomic::Ordering::SeqCst);
	}
}

impl Default for FixedClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for FixedClock {
	fn now(&self) -> Instant {
		let ms = self.offset.load(std::sync::atomic::Ordering::SeqCst);
		self.base + Duration::from_millis(ms)
	}

	fn system_now(&self) -> SystemTime {
		let ms = self.offset.load(std::sync::atomic::Ordering::SeqCst);
		self.base_system + Duration::from_millis(ms)
	}
}
