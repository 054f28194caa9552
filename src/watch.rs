//! Filesystem watcher producing metadata updates
//!
//! Wraps a recursive `notify` watcher. Events are converted on the notify
//! thread by stat-ing the affected path: a missing path becomes a
//! tombstone with mod time 0, which the tree later resolves to the old
//! time ticked by one. Converted updates flow into a bounded channel, so a
//! slow reconciler backpressures the watcher naturally.

use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::logging::*;
use crate::types::Update;

/// Keeps the underlying notify watcher alive; dropping it stops the
/// stream.
pub struct FileWatcher {
	_watcher: notify::RecommendedWatcher,
}

impl FileWatcher {
	/// Watch `root` recursively. Returns the watcher guard and the channel
	/// of converted updates.
	pub fn start(
		root: &Path,
		capacity: usize,
	) -> Result<(FileWatcher, mpsc::Receiver<Update>), SyncError> {
		let (tx, rx) = mpsc::channel(capacity);
		let root_buf = root.to_path_buf();
		let mut watcher =
			notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
				match result {
					Ok(event) => forward_event(&root_buf, event, &tx),
					Err(e) => warn!("Watch error: {}", e),
				}
			})
			.map_err(|e| SyncError::Other {
				message: format!("Failed to create watcher: {}", e),
			})?;
		watcher
			.watch(root, RecursiveMode::Recursive)
			.map_err(|e| SyncError::Other {
				message: format!("Failed to watch {:?}: {}", root, e),
			})?;
		info!("Watching {:?}", root);
		Ok((FileWatcher { _watcher: watcher }, rx))
	}
}

fn forward_event(root: &Path, event: Event, tx: &mpsc::Sender<Update>) {
	if matches!(event.kind, EventKind::Access(_)) {
		return;
	}
	for path in &event.paths {
		let rel = match path.strip_prefix(root) {
			Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().to_string(),
			_ => continue,
		};
		let update = stat_update(&rel, path);
		// blocking_send is fine here: this runs on notify's own thread
		if tx.blocking_send(update).is_err() {
			return; // session is shutting down
		}
	}
}

/// Build an update from the path's current state on disk.
fn stat_update(rel: &str, abs: &PathBuf) -> Update {
	let meta = match std::fs::symlink_metadata(abs) {
		Ok(meta) => meta,
		// Gone already: a tombstone at time 0, the tree ticks the old time
		Err(_) => return Update::tombstone(rel, 0),
	};
	let mod_time = meta
		.modified()
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0);
	if meta.file_type().is_dir() {
		return Update::directory(rel, mod_time);
	}
	if meta.file_type().is_symlink() {
		let target = std::fs::read_link(abs)
			.map(|t| t.to_string_lossy().to_string())
			.unwrap_or_default();
		return Update::symlink(rel, &target, mod_time);
	}
	let mut update = Update::file(rel, mod_time);
	if update.is_gitignore() {
		update.ignore_string = std::fs::read_to_string(abs).unwrap_or_default();
	}
	update
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use tempfile::TempDir;

	async fn wait_for(
		rx: &mut mpsc::Receiver<Update>,
		pred: impl Fn(&Update) -> bool,
	) -> Option<Update> {
		let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
		loop {
			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			match tokio::time::timeout(remaining, rx.recv()).await {
				Ok(Some(update)) if pred(&update) => return Some(update),
				Ok(Some(_)) => continue,
				_ => return None,
			}
		}
	}

	#[tokio::test]
	async fn test_create_produces_update() {
		let dir = TempDir::new().unwrap();
		let (_watcher, mut rx) = FileWatcher::start(dir.path(), 64).unwrap();
		// Give the backend a moment to arm
		tokio::time::sleep(Duration::from_millis(200)).await;

		std::fs::write(dir.path().join("fresh.txt"), b"hello").unwrap();

		let update = wait_for(&mut rx, |u| u.path == "fresh.txt" && !u.delete).await;
		let update = update.expect("no event for created file");
		assert!(!update.directory);
		assert!(update.mod_time > 0);
	}

	#[tokio::test]
	async fn test_remove_produces_tombstone() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("doomed.txt"), b"x").unwrap();
		let (_watcher, mut rx) = FileWatcher::start(dir.path(), 64).unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;

		std::fs::remove_file(dir.path().join("doomed.txt")).unwrap();

		let update = wait_for(&mut rx, |u| u.path == "doomed.txt" && u.delete).await;
		let update = update.expect("no tombstone for removed file");
		assert_eq!(update.mod_time, 0);
	}
}

// vim: ts=4
