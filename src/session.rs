//! Session coordination
//!
//! Wires the five workers of a mirror session around one [`SyncLogic`]:
//! local scanner, local watch forwarder, peer reader, peer writer and the
//! filesystem writer. All communication runs over bounded channels; the
//! tree itself never leaves the reconcile task.
//!
//! Failure of any worker fires its failure hook, which lands on the
//! session's error channel; `join` then stops every sibling and surfaces a
//! single top-level error.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::SyncError;
use crate::fs_access::FileAccess;
use crate::logging::*;
use crate::peer::{PeerReader, PeerWriter};
use crate::sync::SyncLogic;
use crate::tasks::{Step, TaskLogic, TaskRunner};
use crate::tree::UpdateTree;
use crate::types::{FsOp, PeerOutbound, Side, SyncItem, Update};

/// Worker: one-shot full scan of the local tree, teed to the reconciler
/// (as the local side) and to the peer (as their remote side), each stream
/// ending with its sentinel.
struct Scanner {
	fs: Arc<dyn FileAccess>,
	inbox: mpsc::Sender<SyncItem>,
	peer: mpsc::Sender<PeerOutbound>,
}

#[async_trait]
impl TaskLogic for Scanner {
	fn name(&self) -> &str {
		"local-scanner"
	}

	async fn step(&mut self) -> Result<Step, SyncError> {
		let (tx, mut rx) = mpsc::channel(64);
		let fs = Arc::clone(&self.fs);
		let scan = tokio::spawn(async move { fs.scan(tx).await });
		let mut count = 0usize;
		while let Some(update) = rx.recv().await {
			self.inbox
				.send(SyncItem::Update(Side::Local, update.clone()))
				.await
				.map_err(|_| SyncError::ChannelClosed { channel: "sync-inbox" })?;
			self.peer
				.send(PeerOutbound::Meta(update))
				.await
				.map_err(|_| SyncError::ChannelClosed { channel: "peer-outbound" })?;
			count += 1;
		}
		match scan.await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				return Err(SyncError::ProducerFailure {
					task: "local-scanner".to_string(),
					message: e.to_string(),
				})
			}
			Err(e) => {
				return Err(SyncError::ProducerFailure {
					task: "local-scanner".to_string(),
					message: format!("scan task died: {}", e),
				})
			}
		}
		info!("Local scan delivered {} paths", count);
		self.inbox
			.send(SyncItem::ScanDone(Side::Local))
			.await
			.map_err(|_| SyncError::ChannelClosed { channel: "sync-inbox" })?;
		self.peer
			.send(PeerOutbound::ScanDone)
			.await
			.map_err(|_| SyncError::ChannelClosed { channel: "peer-outbound" })?;
		Ok(Step::Finished)
	}
}

/// Worker: forwards watcher events into the reconciler inbox.
struct WatchForwarder {
	events: mpsc::Receiver<Update>,
	inbox: mpsc::Sender<SyncItem>,
}

#[async_trait]
impl TaskLogic for WatchForwarder {
	fn name(&self) -> &str {
		"local-watcher"
	}

	async fn step(&mut self) -> Result<Step, SyncError> {
		let update = match self.events.recv().await {
			Some(update) => update,
			None => return Ok(Step::Finished),
		};
		self.inbox
			.send(SyncItem::Update(Side::Local, update))
			.await
			.map_err(|_| SyncError::ChannelClosed { channel: "sync-inbox" })?;
		Ok(Step::Continue)
	}
}

/// Worker: the only place filesystem mutations happen, so sibling
/// creations and deletions under one directory never race each other.
struct FsWriter {
	ops: mpsc::Receiver<FsOp>,
	fs: Arc<dyn FileAccess>,
	inbox: mpsc::Sender<SyncItem>,
}

#[async_trait]
impl TaskLogic for FsWriter {
	fn name(&self) -> &str {
		"fs-writer"
	}

	async fn step(&mut self) -> Result<Step, SyncError> {
		let op = match self.ops.recv().await {
			Some(op) => op,
			None => return Ok(Step::Finished),
		};
		let result = match &op {
			FsOp::Mkdir(update) => self.fs.mkdir(update).await,
			FsOp::Write(update) => self.fs.write(update).await,
			FsOp::Mklink(update) => self.fs.mklink(update).await,
			FsOp::Delete(update) => self.fs.delete(&update.path).await,
		};
		if let Err(e) = result {
			// Transient faults (permissions, vanished parents) must not
			// kill the session; the node goes back to dirty instead
			warn!("Filesystem write for {:?} failed: {}", op.update().path, e);
			if self.inbox.try_send(SyncItem::ApplyFailed(op.into_update())).is_err() {
				warn!("Retry queue full; waiting for a later change to resync");
			}
		}
		Ok(Step::Continue)
	}
}

/// A running mirror session.
pub struct Session {
	runner: Arc<TaskRunner>,
	errors: mpsc::Receiver<SyncError>,
}

impl Session {
	/// Start all workers for one session.
	///
	/// `peer_reader`/`peer_writer` carry `PeerMessage` frames to the other
	/// side (a spawned child's stdio, or stdin/stdout in serve mode);
	/// `watch_events` is the already-started watcher's output.
	pub fn start<R, W>(
		config: &Config,
		fs: Arc<dyn FileAccess>,
		peer_reader: R,
		peer_writer: W,
		watch_events: mpsc::Receiver<Update>,
	) -> Session
	where
		R: AsyncBufRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let capacity = config.channel_capacity;
		let (inbox_tx, inbox_rx) = mpsc::channel::<SyncItem>(capacity);
		let (peer_tx, peer_rx) = mpsc::channel::<PeerOutbound>(capacity);
		let (fs_tx, fs_rx) = mpsc::channel::<FsOp>(capacity);
		let (error_tx, error_rx) = mpsc::channel::<SyncError>(8);

		let runner = Arc::new(TaskRunner::new());
		let fail = |tx: mpsc::Sender<SyncError>| {
			move |e| {
				let _ = tx.try_send(e);
			}
		};

		runner.run_task(
			Box::new(Scanner {
				fs: Arc::clone(&fs),
				inbox: inbox_tx.clone(),
				peer: peer_tx.clone(),
			}),
			fail(error_tx.clone()),
		);
		runner.run_task(
			Box::new(WatchForwarder { events: watch_events, inbox: inbox_tx.clone() }),
			fail(error_tx.clone()),
		);
		runner.run_task(
			Box::new(PeerReader::new(peer_reader, inbox_tx.clone())),
			fail(error_tx.clone()),
		);
		runner.run_task(
			Box::new(PeerWriter::new(peer_writer, peer_rx, Arc::clone(&fs))),
			fail(error_tx.clone()),
		);
		runner.run_task(
			Box::new(FsWriter { ops: fs_rx, fs, inbox: inbox_tx.clone() }),
			fail(error_tx.clone()),
		);

		let (extra_excludes, extra_includes) = config.rules();
		let tree = UpdateTree::with_rules(extra_excludes, extra_includes);
		runner.run_task(
			Box::new(SyncLogic::new(tree, inbox_rx, peer_tx, fs_tx)),
			fail(error_tx),
		);

		Session { runner, errors: error_rx }
	}

	/// Wait for the session to end. The first worker failure stops all
	/// siblings and becomes the session's result.
	pub async fn join(mut self) -> Result<(), SyncError> {
		match self.errors.recv().await {
			Some(e) => {
				error!("Session failed: {}", e);
				self.runner.stop_all().await;
				Err(e)
			}
			None => Ok(()),
		}
	}

	/// Stop all workers without waiting for a failure.
	pub async fn shutdown(self) {
		self.runner.stop_all().await;
	}

	pub fn is_running(&self, task: &str) -> bool {
		self.runner.is_running(task)
	}
}

// vim: ts=4
