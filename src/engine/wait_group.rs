//! Counter that tasks can await until it drops to zero.

// crates.io
use tokio::sync::Notify;
// self
use crate::_prelude::*;

/// Tracks outstanding requests.
#[derive(Debug, Default)]
pub struct WaitGroup {
	count: Mutex<usize>,
	notify: Notify,
}
impl WaitGroup {
	/// Registers `n` more outstanding requests.
	pub fn add(&self, n: usize) {
		*self.count.lock() += n;
	}

	/// Marks one request finished.
	pub fn done(&self) {
		let mut count = self.count.lock();

		if *count == 0 {
			tracing::warn!("Wait group released more often than it was added to.");

			return;
		}

		*count -= 1;

		if *count == 0 {
			self.notify.notify_waiters();
		}
	}

	/// Outstanding requests.
	pub fn count(&self) -> usize {
		*self.count.lock()
	}

	/// Resolves once the count reaches zero.
	pub async fn wait(&self) {
		loop {
			let notified = self.notify.notified();

			if self.count() == 0 {
				return;
			}

			notified.await;
		}
	}
}
