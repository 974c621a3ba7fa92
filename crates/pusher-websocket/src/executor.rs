use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A unit of work submitted to the executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serial work queue supplied by the host.
///
/// Every state transition and every listener callback in this crate runs as a
/// job on this queue, so submitted work must execute one job at a time, in
/// submission order. `schedule` enqueues a job after a delay; deadline expiry
/// checks arrive through it rather than through platform timers.
pub trait Executor: Send + Sync {
	fn submit(&self, job: Job);

	fn schedule(&self, delay: Duration, job: Job);
}

/// Production executor: a single spawned task draining an unbounded queue.
pub struct TokioExecutor {
	jobs: mpsc::UnboundedSender<Job>,
	handle: tokio::runtime::Handle,
}

impl TokioExecutor {
	/// Spawn the drain task on the current tokio runtime.
	///
	/// # Panics
	/// Panics when called outside a tokio runtime context.
	#[must_use]
	pub fn start() -> Self {
		let handle = tokio::runtime::Handle::current();
		let (jobs, mut receiver) = mpsc::unbounded_channel::<Job>();

		handle.spawn(async move {
			while let Some(job) = receiver.recv().await {
				job();
			}
			debug!("executor queue closed, drain task exiting");
		});

		Self { jobs, handle }
	}
}

impl Executor for TokioExecutor {
	fn submit(&self, job: Job) {
		if self.jobs.send(job).is_err() {
			warn!("executor drain task is gone, dropping job");
		}
	}

	fn schedule(&self, delay: Duration, job: Job) {
		let jobs = self.jobs.clone();
		self.handle.spawn(async move {
			tokio::time::sleep(delay).await;
			let _ = jobs.send(job);
		});
	}
}
