//! Filesystem adapter consumed by the core
//!
//! The reconciler never touches the disk itself; it goes through this
//! trait so the scan, the content reads and every mutation stay behind one
//! seam. `NativeFileAccess` is the real implementation, rooted at the sync
//! root and addressed with slash-separated relative paths.

use async_trait::async_trait;
use filetime::FileTime;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::types::Update;

#[async_trait]
pub trait FileAccess: Send + Sync {
	/// Full scan of the root. Emits metadata updates parent before child;
	/// `.gitignore` contents ride along in `ignore_string`.
	async fn scan(&self, into: mpsc::Sender<Update>) -> Result<(), SyncError>;

	/// File contents plus the mod time they were read at.
	async fn read(&self, path: &str) -> Result<(Vec<u8>, i64), SyncError>;

	/// Write a file's bytes and stamp its mod time from the update.
	async fn write(&self, update: &Update) -> Result<(), SyncError>;

	async fn mkdir(&self, update: &Update) -> Result<(), SyncError>;

	/// Create (or retarget) a symlink.
	async fn mklink(&self, update: &Update) -> Result<(), SyncError>;

	/// Remove a path, cascading for directories. Removing something that
	/// is already gone is not an error.
	async fn delete(&self, path: &str) -> Result<(), SyncError>;
}

/// The real filesystem, rooted at one directory.
pub struct NativeFileAccess {
	root: PathBuf,
}

impl NativeFileAccess {
	pub fn new(root: impl Into<PathBuf>) -> NativeFileAccess {
		NativeFileAccess { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn resolve(&self, rel: &str) -> Result<PathBuf, SyncError> {
		if rel.starts_with('/') || rel.split('/').any(|s| s == "..") {
			return Err(SyncError::Other {
				message: format!("Path escapes the sync root: {:?}", rel),
			});
		}
		Ok(self.root.join(rel))
	}

	async fn entry_update(&self, rel: String, abs: &Path) -> Result<Update, SyncError> {
		let meta = tokio::fs::symlink_metadata(abs).await?;
		let mod_time = mod_time_millis(&meta);
		if meta.file_type().is_dir() {
			return Ok(Update::directory(&rel, mod_time));
		}
		if meta.file_type().is_symlink() {
			let target = tokio::fs::read_link(abs).await?;
			return Ok(Update::symlink(&rel, &target.to_string_lossy(), mod_time));
		}
		let mut update = Update::file(&rel, mod_time);
		if update.is_gitignore() {
			update.ignore_string = tokio::fs::read_to_string(abs).await.unwrap_or_default();
		}
		Ok(update)
	}
}

fn mod_time_millis(meta: &std::fs::Metadata) -> i64 {
	meta.modified()
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

#[async_trait]
impl FileAccess for NativeFileAccess {
	async fn scan(&self, into: mpsc::Sender<Update>) -> Result<(), SyncError> {
		let mut queue: VecDeque<String> = VecDeque::new();
		queue.push_back(String::new());
		while let Some(rel_dir) = queue.pop_front() {
			let abs_dir =
				if rel_dir.is_empty() { self.root.clone() } else { self.resolve(&rel_dir)? };
			let mut names = Vec::new();
			let mut entries = tokio::fs::read_dir(&abs_dir).await?;
			while let Some(entry) = entries.next_entry().await? {
				names.push(entry.file_name().to_string_lossy().to_string());
			}
			// Deterministic order makes scans comparable across runs
			names.sort();
			for name in names {
				let rel = if rel_dir.is_empty() {
					name.clone()
				} else {
					format!("{}/{}", rel_dir, name)
				};
				let abs = abs_dir.join(&name);
				let update = self.entry_update(rel.clone(), &abs).await?;
				let is_dir = update.directory;
				into.send(update)
					.await
					.map_err(|_| SyncError::ChannelClosed { channel: "scan" })?;
				if is_dir {
					queue.push_back(rel);
				}
			}
		}
		Ok(())
	}

	async fn read(&self, path: &str) -> Result<(Vec<u8>, i64), SyncError> {
		let abs = self.resolve(path)?;
		let data = tokio::fs::read(&abs).await?;
		let meta = tokio::fs::symlink_metadata(&abs).await?;
		Ok((data, mod_time_millis(&meta)))
	}

	async fn write(&self, update: &Update) -> Result<(), SyncError> {
		let abs = self.resolve(&update.path)?;
		if let Some(parent) = abs.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let data = update.data.as_deref().unwrap_or_default();
		tokio::fs::write(&abs, data).await?;
		set_mod_time(&abs, update.mod_time)?;
		Ok(())
	}

	async fn mkdir(&self, update: &Update) -> Result<(), SyncError> {
		let abs = self.resolve(&update.path)?;
		tokio::fs::create_dir_all(&abs).await?;
		Ok(())
	}

	async fn mklink(&self, update: &Update) -> Result<(), SyncError> {
		let abs = self.resolve(&update.path)?;
		if let Some(parent) = abs.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		// Retargeting means replacing; symlink creation does not overwrite
		match tokio::fs::symlink_metadata(&abs).await {
			Ok(meta) if meta.file_type().is_dir() => tokio::fs::remove_dir_all(&abs).await?,
			Ok(_) => tokio::fs::remove_file(&abs).await?,
			Err(_) => {}
		}
		make_symlink(&update.symlink, &abs).await?;
		Ok(())
	}

	async fn delete(&self, path: &str) -> Result<(), SyncError> {
		let abs = self.resolve(path)?;
		match tokio::fs::symlink_metadata(&abs).await {
			Ok(meta) if meta.file_type().is_dir() => {
				tokio::fs::remove_dir_all(&abs).await?;
			}
			Ok(_) => {
				tokio::fs::remove_file(&abs).await?;
			}
			Err(_) => {} // already gone
		}
		Ok(())
	}
}

fn set_mod_time(abs: &Path, mod_time: i64) -> Result<(), SyncError> {
	let time = FileTime::from_unix_time(mod_time / 1000, ((mod_time % 1000) * 1_000_000) as u32);
	filetime::set_file_mtime(abs, time)?;
	Ok(())
}

#[cfg(unix)]
async fn make_symlink(target: &str, abs: &Path) -> Result<(), SyncError> {
	tokio::fs::symlink(target, abs).await?;
	Ok(())
}

#[cfg(not(unix))]
async fn make_symlink(_target: &str, _abs: &Path) -> Result<(), SyncError> {
	Err(SyncError::Other { message: "Symlinks are not supported on this platform".to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	async fn collect_scan(fs: &NativeFileAccess) -> Vec<Update> {
		let (tx, mut rx) = mpsc::channel(256);
		fs.scan(tx).await.unwrap();
		let mut updates = Vec::new();
		while let Ok(update) = rx.try_recv() {
			updates.push(update);
		}
		updates
	}

	#[tokio::test]
	async fn test_scan_parent_before_child() {
		let dir = TempDir::new().unwrap();
		std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
		std::fs::write(dir.path().join("a/b/c.txt"), b"hi").unwrap();
		std::fs::write(dir.path().join("top.txt"), b"x").unwrap();

		let fs = NativeFileAccess::new(dir.path());
		let updates = collect_scan(&fs).await;
		let paths: Vec<&str> = updates.iter().map(|u| u.path.as_str()).collect();

		let pos = |p: &str| paths.iter().position(|x| *x == p).unwrap();
		assert!(pos("a") < pos("a/b"));
		assert!(pos("a/b") < pos("a/b/c.txt"));
		assert!(paths.contains(&"top.txt"));

		let child = updates.iter().find(|u| u.path == "a/b/c.txt").unwrap();
		assert!(!child.directory);
		assert!(child.mod_time > 0);
	}

	#[tokio::test]
	async fn test_scan_reads_gitignore_contents() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();

		let fs = NativeFileAccess::new(dir.path());
		let updates = collect_scan(&fs).await;
		let ignore = updates.iter().find(|u| u.path == ".gitignore").unwrap();
		assert_eq!(ignore.ignore_string, "*.log\n");
	}

	#[tokio::test]
	async fn test_write_stamps_mod_time() {
		let dir = TempDir::new().unwrap();
		let fs = NativeFileAccess::new(dir.path());
		let update = Update::file("sub/a.txt", 1_500_000_000_000).with_data(b"hello".to_vec());
		fs.write(&update).await.unwrap();

		let (data, mod_time) = fs.read("sub/a.txt").await.unwrap();
		assert_eq!(data, b"hello");
		assert_eq!(mod_time, 1_500_000_000_000);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_mklink_and_retarget() {
		let dir = TempDir::new().unwrap();
		let fs = NativeFileAccess::new(dir.path());
		fs.mklink(&Update::symlink("link", "first", 1)).await.unwrap();
		fs.mklink(&Update::symlink("link", "second", 2)).await.unwrap();

		let target = std::fs::read_link(dir.path().join("link")).unwrap();
		assert_eq!(target.to_string_lossy(), "second");
	}

	#[tokio::test]
	async fn test_delete_cascades_and_tolerates_missing() {
		let dir = TempDir::new().unwrap();
		std::fs::create_dir_all(dir.path().join("d/inner")).unwrap();
		std::fs::write(dir.path().join("d/inner/f.txt"), b"x").unwrap();

		let fs = NativeFileAccess::new(dir.path());
		fs.delete("d").await.unwrap();
		assert!(!dir.path().join("d").exists());

		// Second delete is a no-op
		fs.delete("d").await.unwrap();
	}

	#[tokio::test]
	async fn test_resolve_rejects_escapes() {
		let dir = TempDir::new().unwrap();
		let fs = NativeFileAccess::new(dir.path());
		assert!(fs.read("../outside").await.is_err());
		assert!(fs.read("/etc/passwd").await.is_err());
	}
}

// vim: ts=4
