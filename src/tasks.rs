//! Task supervision for the session's long-lived workers
//!
//! Runs each worker loop on its own tokio task, kind of like actors: a
//! worker owns its inbox and handles one item per step. Stopping is
//! cooperative (a stop signal checked between steps); a failing step fires
//! the worker's failure hook exactly once and parks the task.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{SyncError, TaskError};
use crate::logging::*;

/// Outcome of one iteration of a worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
	Continue,
	Finished,
}

/// One worker's loop body.
#[async_trait]
pub trait TaskLogic: Send + 'static {
	fn name(&self) -> &str;

	/// Pull one item and handle it. `Finished` ends the loop normally; an
	/// error invokes the task's failure hook and stops the loop.
	async fn step(&mut self) -> Result<Step, SyncError>;
}

struct RunningTask {
	stop: watch::Sender<bool>,
	join: JoinHandle<()>,
}

/// Supervisor for the session's workers, keyed by task name.
pub struct TaskRunner {
	tasks: Mutex<HashMap<String, RunningTask>>,
}

impl TaskRunner {
	pub fn new() -> TaskRunner {
		TaskRunner { tasks: Mutex::new(HashMap::new()) }
	}

	/// Start a worker. `on_failure` runs at most once, from the worker's
	/// own task, before the worker stops.
	pub fn run_task<F>(&self, mut logic: Box<dyn TaskLogic>, on_failure: F)
	where
		F: FnOnce(SyncError) + Send + 'static,
	{
		let name = logic.name().to_string();
		let (stop_tx, mut stop_rx) = watch::channel(false);
		let task_name = name.clone();
		let mut on_failure = Some(on_failure);
		let join = tokio::spawn(async move {
			debug!("Worker '{}' started", task_name);
			loop {
				tokio::select! {
					_ = stop_rx.changed() => {
						debug!("Worker '{}' stopping", task_name);
						break;
					}
					result = logic.step() => match result {
						Ok(Step::Continue) => {}
						Ok(Step::Finished) => {
							debug!("Worker '{}' finished", task_name);
							break;
						}
						Err(e) => {
							error!("Worker '{}' failed: {}", task_name, e);
							if let Some(hook) = on_failure.take() {
								hook(e);
							}
							break;
						}
					}
				}
			}
		});
		let previous = self
			.tasks
			.lock()
			.expect("task table poisoned")
			.insert(name, RunningTask { stop: stop_tx, join });
		if let Some(previous) = previous {
			// Same-named task restarted; the old one is signalled but not
			// awaited here
			let _ = previous.stop.send(true);
		}
	}

	/// Signal a worker to stop and wait for it to exit.
	pub async fn stop_task(&self, name: &str) -> Result<(), SyncError> {
		let task = self
			.tasks
			.lock()
			.expect("task table poisoned")
			.remove(name)
			.ok_or_else(|| SyncError::Task(TaskError::NoSuchTask { name: name.to_string() }))?;
		let _ = task.stop.send(true);
		if let Err(e) = task.join.await {
			if e.is_panic() {
				error!("Worker '{}' panicked", name);
			}
		}
		Ok(())
	}

	/// Stop every worker. Used for session teardown; never called from
	/// inside a worker.
	pub async fn stop_all(&self) {
		let tasks: Vec<(String, RunningTask)> = self
			.tasks
			.lock()
			.expect("task table poisoned")
			.drain()
			.collect();
		for (name, task) in tasks {
			let _ = task.stop.send(true);
			if let Err(e) = task.join.await {
				if e.is_panic() {
					error!("Worker '{}' panicked", name);
				}
			}
		}
	}

	pub fn is_running(&self, name: &str) -> bool {
		self.tasks
			.lock()
			.expect("task table poisoned")
			.get(name)
			.map(|t| !t.join.is_finished())
			.unwrap_or(false)
	}
}

impl Default for TaskRunner {
	fn default() -> Self {
		TaskRunner::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use tokio::sync::mpsc;

	struct Counter {
		inbox: mpsc::Receiver<u32>,
		seen: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl TaskLogic for Counter {
		fn name(&self) -> &str {
			"counter"
		}

		async fn step(&mut self) -> Result<Step, SyncError> {
			match self.inbox.recv().await {
				Some(0) => Err(SyncError::Other { message: "zero".to_string() }),
				Some(_) => {
					self.seen.fetch_add(1, Ordering::SeqCst);
					Ok(Step::Continue)
				}
				None => Ok(Step::Finished),
			}
		}
	}

	#[tokio::test]
	async fn test_run_and_stop() {
		let runner = TaskRunner::new();
		let (tx, rx) = mpsc::channel(8);
		let seen = Arc::new(AtomicUsize::new(0));
		runner.run_task(
			Box::new(Counter { inbox: rx, seen: Arc::clone(&seen) }),
			|_| panic!("should not fail"),
		);

		tx.send(1).await.unwrap();
		tx.send(2).await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		assert_eq!(seen.load(Ordering::SeqCst), 2);

		runner.stop_task("counter").await.unwrap();
		assert!(!runner.is_running("counter"));
	}

	#[tokio::test]
	async fn test_failure_hook_fires_once() {
		let runner = TaskRunner::new();
		let (tx, rx) = mpsc::channel(8);
		let seen = Arc::new(AtomicUsize::new(0));
		let failures = Arc::new(AtomicUsize::new(0));
		let hook_count = Arc::clone(&failures);
		runner.run_task(
			Box::new(Counter { inbox: rx, seen }),
			move |_| {
				hook_count.fetch_add(1, Ordering::SeqCst);
			},
		);

		tx.send(0).await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		assert_eq!(failures.load(Ordering::SeqCst), 1);
		assert!(!runner.is_running("counter"));

		// The task still exists for a deterministic join
		runner.stop_task("counter").await.unwrap();
	}

	#[tokio::test]
	async fn test_finishes_when_inbox_closes() {
		let runner = TaskRunner::new();
		let (tx, rx) = mpsc::channel(8);
		let seen = Arc::new(AtomicUsize::new(0));
		runner.run_task(
			Box::new(Counter { inbox: rx, seen: Arc::clone(&seen) }),
			|_| panic!("should not fail"),
		);
		drop(tx);
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		assert!(!runner.is_running("counter"));
	}

	#[tokio::test]
	async fn test_stop_unknown_task() {
		let runner = TaskRunner::new();
		let err = runner.stop_task("nope").await.unwrap_err();
		match err {
			SyncError::Task(TaskError::NoSuchTask { name }) => assert_eq!(name, "nope"),
			other => panic!("unexpected error: {}", other),
		}
	}
}

// vim: ts=4
