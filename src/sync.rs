//! The reconciler: single-threaded consumer of the merged update queue
//!
//! `SyncLogic` owns the [`UpdateTree`] outright. Producers (scanner,
//! watcher, peer reader) only ever talk to it through its inbox, so no
//! locks guard the tree; thread confinement is the invariant.
//!
//! Emissions are deferred until both initial-scan sentinels have arrived.
//! The first pass then walks the entire tree to emit the union diff;
//! afterwards each inbox batch ends with a pruned walk over the dirty
//! subset.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::SyncError;
use crate::logging::*;
use crate::tasks::{Step, TaskLogic};
use crate::tree::{Node, UpdateTree};
use crate::types::{FsOp, PeerOutbound, Side, SyncItem, Update};

/// Drain at most this many inbox items before forcing a reconcile pass.
const FLUSH_THRESHOLD: usize = 1000;

/// Where one node stands between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
	/// Neither side known; cannot happen for a node created by an update.
	Unknown,
	LocalOnly,
	RemoteOnly,
	/// Mod times match; terminal until a new update arrives.
	Agreed,
	DiffLocalNewer,
	DiffRemoteNewer,
	/// The sides disagree about what the path is (file/dir/symlink).
	TypeConflict,
	/// Deleted on both sides.
	TombstoneBoth,
}

/// Classify a node. Ties are "agreed" even when the types disagree, since
/// there is no newer side to pick a winner from.
pub fn classify(node: &Node) -> SyncStatus {
	match (node.local(), node.remote()) {
		(None, None) => SyncStatus::Unknown,
		(Some(_), None) => SyncStatus::LocalOnly,
		(None, Some(_)) => SyncStatus::RemoteOnly,
		(Some(local), Some(remote)) => {
			if local.delete && remote.delete {
				SyncStatus::TombstoneBoth
			} else if local.mod_time == remote.mod_time {
				SyncStatus::Agreed
			} else if !node.is_same_type() {
				SyncStatus::TypeConflict
			} else if local.mod_time > remote.mod_time {
				SyncStatus::DiffLocalNewer
			} else {
				SyncStatus::DiffRemoteNewer
			}
		}
	}
}

/// What a decision emits: something for the peer or something for the
/// local filesystem writer.
#[derive(Debug)]
enum Action {
	PeerMeta(Update),
	PeerContent(Update),
	Fs(FsOp),
}

/// Decision table for one dirty, non-ignored node.
///
/// Winner snapshots are copied into the loser slot so the echo of our own
/// emission (watcher event, peer acknowledgment scan) compares equal and
/// goes quiet.
fn decide(node: &mut Node, actions: &mut Vec<Action>) {
	match classify(node) {
		SyncStatus::Unknown | SyncStatus::TombstoneBoth => {}
		SyncStatus::Agreed => {
			if let (Some(local), Some(remote)) = (node.local(), node.remote()) {
				if local.meta_clone() != remote.meta_clone() {
					warn!(
						"{:?}: equal mod time {} but differing metadata; leaving both sides alone",
						node.path(),
						local.mod_time,
					);
				}
			}
		}
		SyncStatus::LocalOnly | SyncStatus::DiffLocalNewer => {
			let local = node.local().expect("classified").meta_clone();
			let both_directories = local.directory
				&& !local.delete
				&& node.remote().map_or(false, |r| r.directory && !r.delete);
			if local.delete {
				actions.push(Action::PeerMeta(local.clone()));
			} else if both_directories {
				// structural only; the walk still descends into children
			} else if local.is_file() {
				actions.push(Action::PeerContent(local.clone()));
			} else {
				actions.push(Action::PeerMeta(local.clone()));
			}
			node.set_remote_snapshot(local);
		}
		SyncStatus::RemoteOnly | SyncStatus::DiffRemoteNewer => {
			let remote = node.remote().expect("classified").meta_clone();
			let both_directories = remote.directory
				&& !remote.delete
				&& node.local().map_or(false, |l| l.directory && !l.delete);
			if remote.delete {
				actions.push(Action::Fs(FsOp::Delete(remote.clone())));
				node.set_local_snapshot(remote);
			} else if both_directories {
				node.set_local_snapshot(remote);
			} else if remote.directory {
				actions.push(Action::Fs(FsOp::Mkdir(remote.clone())));
				node.set_local_snapshot(remote);
			} else if !remote.symlink.is_empty() {
				actions.push(Action::Fs(FsOp::Mklink(remote.clone())));
				node.set_local_snapshot(remote);
			} else {
				match node.take_remote_data() {
					Some(data) => {
						actions.push(Action::Fs(FsOp::Write(remote.clone().with_data(data))));
						node.set_local_snapshot(remote);
					}
					None => {
						// Content has not arrived yet; the peer pushes it
						// from its own local-newer decision. Leave the
						// slots apart so the content update re-dirties us.
					}
				}
			}
		}
		SyncStatus::TypeConflict => {
			// The newer side wins: delete the loser's shape, then create
			// the winner's
			if node.is_local_newer() {
				let local = node.local().expect("classified").meta_clone();
				actions.push(Action::PeerMeta(Update::tombstone(&local.path, local.mod_time)));
				if !local.delete {
					if local.is_file() {
						actions.push(Action::PeerContent(local.clone()));
					} else {
						actions.push(Action::PeerMeta(local.clone()));
					}
				}
				node.set_remote_snapshot(local);
			} else if node.is_remote_newer() {
				let remote = node.remote().expect("classified").meta_clone();
				actions.push(Action::Fs(FsOp::Delete(Update::tombstone(
					&remote.path,
					remote.mod_time,
				))));
				if remote.delete {
					node.set_local_snapshot(remote);
				} else if remote.directory {
					actions.push(Action::Fs(FsOp::Mkdir(remote.clone())));
					node.set_local_snapshot(remote);
				} else if !remote.symlink.is_empty() {
					actions.push(Action::Fs(FsOp::Mklink(remote.clone())));
					node.set_local_snapshot(remote);
				} else {
					match node.take_remote_data() {
						Some(data) => {
							actions
								.push(Action::Fs(FsOp::Write(remote.clone().with_data(data))));
							node.set_local_snapshot(remote);
						}
						None => {
							// The old shape is already deleted; record a
							// tombstone older than the incoming file so the
							// content update lands as remote-newer
							node.set_local_snapshot(Update::tombstone(
								&remote.path,
								remote.mod_time - 1,
							));
						}
					}
				}
			}
		}
	}
}

/// The reconcile worker. See the module docs for the threading story.
pub struct SyncLogic {
	tree: UpdateTree,
	inbox: mpsc::Receiver<SyncItem>,
	to_peer: mpsc::Sender<PeerOutbound>,
	to_fs: mpsc::Sender<FsOp>,
	local_scan_done: bool,
	remote_scan_done: bool,
	initial_pass_done: bool,
	pending: usize,
}

impl SyncLogic {
	pub fn new(
		tree: UpdateTree,
		inbox: mpsc::Receiver<SyncItem>,
		to_peer: mpsc::Sender<PeerOutbound>,
		to_fs: mpsc::Sender<FsOp>,
	) -> SyncLogic {
		SyncLogic {
			tree,
			inbox,
			to_peer,
			to_fs,
			local_scan_done: false,
			remote_scan_done: false,
			initial_pass_done: false,
			pending: 0,
		}
	}

	pub fn tree(&self) -> &UpdateTree {
		&self.tree
	}

	/// Apply one inbox item to the tree. Returns whether the caller must
	/// flush immediately (a streaming `.gitignore` change may reshape what
	/// everything below it means).
	pub async fn process(&mut self, item: SyncItem) -> Result<bool, SyncError> {
		match item {
			SyncItem::Update(side, update) => {
				let force = self.initial_pass_done && update.is_gitignore();
				if let Err(e) = self.tree.add(side, update) {
					// A bad local path is our own bug; a bad remote path is
					// the peer's
					return Err(match side {
						Side::Remote => {
							SyncError::ProtocolViolation { message: e.to_string() }
						}
						Side::Local => e.into(),
					});
				}
				self.pending += 1;
				Ok(force)
			}
			SyncItem::ScanDone(side) => {
				info!("Initial scan complete on the {} side", side);
				match side {
					Side::Local => self.local_scan_done = true,
					Side::Remote => self.remote_scan_done = true,
				}
				if self.local_scan_done && self.remote_scan_done && !self.initial_pass_done {
					self.initial_pass_done = true;
					self.reconcile_everything().await?;
				}
				Ok(false)
			}
			SyncItem::ApplyFailed(update) => {
				// Leave the node dirty; the next reconcile pass retries it
				warn!("Retrying {:?} on the next pass", update.path);
				self.tree.clear_local_slot(&update.path);
				self.tree.add(Side::Remote, update)?;
				Ok(false)
			}
		}
	}

	/// One union-diff pass over the whole tree.
	async fn reconcile_everything(&mut self) -> Result<(), SyncError> {
		let mut actions = Vec::new();
		self.tree.reconcile_all(|node, ignored| {
			if !ignored {
				decide(node, &mut actions);
			}
		});
		debug!("Initial reconcile pass produced {} actions", actions.len());
		self.pending = 0;
		self.dispatch(actions).await
	}

	/// Pruned pass over the dirty subset.
	async fn flush(&mut self) -> Result<(), SyncError> {
		let mut actions = Vec::new();
		self.tree.visit_dirty(|node, ignored| {
			if !ignored {
				decide(node, &mut actions);
			}
		});
		self.pending = 0;
		self.dispatch(actions).await
	}

	async fn flush_if_ready(&mut self, force: bool) -> Result<(), SyncError> {
		if !self.initial_pass_done {
			return Ok(());
		}
		if self.pending == 0 && !force {
			return Ok(());
		}
		self.flush().await
	}

	async fn dispatch(&mut self, actions: Vec<Action>) -> Result<(), SyncError> {
		for action in actions {
			match action {
				Action::PeerMeta(update) => self
					.to_peer
					.send(PeerOutbound::Meta(update))
					.await
					.map_err(|_| SyncError::ChannelClosed { channel: "peer-outbound" })?,
				Action::PeerContent(update) => self
					.to_peer
					.send(PeerOutbound::Content(update))
					.await
					.map_err(|_| SyncError::ChannelClosed { channel: "peer-outbound" })?,
				Action::Fs(op) => self
					.to_fs
					.send(op)
					.await
					.map_err(|_| SyncError::ChannelClosed { channel: "fs-ops" })?,
			}
		}
		Ok(())
	}
}

#[async_trait]
impl TaskLogic for SyncLogic {
	fn name(&self) -> &str {
		"sync-logic"
	}

	async fn step(&mut self) -> Result<Step, SyncError> {
		let item = match self.inbox.recv().await {
			Some(item) => item,
			None => return Ok(Step::Finished),
		};
		let mut force = self.process(item).await?;
		// Keep draining until idle so one pass covers a burst of updates
		while !force && self.pending < FLUSH_THRESHOLD {
			match self.inbox.try_recv() {
				Ok(item) => force |= self.process(item).await?,
				Err(TryRecvError::Empty) => break,
				Err(TryRecvError::Disconnected) => break,
			}
		}
		self.flush_if_ready(force).await?;
		Ok(Step::Continue)
	}
}


// vim: ts=4
