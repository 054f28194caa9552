//! Session configuration
//!
//! One flat struct with serde defaults, loadable from a JSON profile. CLI
//! flags override nothing here yet; the binary builds a `Config` directly
//! from its arguments.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::rules::PathRules;
use crate::tree::{DEFAULT_EXTRA_EXCLUDES, DEFAULT_EXTRA_INCLUDES};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Directory this side of the mirror is rooted at.
	pub root: PathBuf,

	/// Patterns excluded on top of tree-local `.gitignore` files.
	pub extra_excludes: Vec<String>,

	/// Patterns mirrored even when an exclude or a `.gitignore` matches.
	pub extra_includes: Vec<String>,

	/// Capacity of the inter-worker channels; backpressure propagates to
	/// the producers when the reconciler falls behind.
	pub channel_capacity: usize,

	/// Capacity of the watcher's event channel.
	pub watch_capacity: usize,

	/// Command used to reach remote peers.
	pub ssh_command: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			root: PathBuf::from("."),
			extra_excludes: DEFAULT_EXTRA_EXCLUDES.iter().map(|s| s.to_string()).collect(),
			extra_includes: DEFAULT_EXTRA_INCLUDES.iter().map(|s| s.to_string()).collect(),
			channel_capacity: 1024,
			watch_capacity: 1024,
			ssh_command: "ssh".to_string(),
		}
	}
}

impl Config {
	pub fn for_root(root: impl Into<PathBuf>) -> Config {
		Config { root: root.into(), ..Config::default() }
	}

	/// Compile the configured pattern lists.
	pub fn rules(&self) -> (PathRules, PathRules) {
		(
			PathRules::from_lines(&self.extra_excludes),
			PathRules::from_lines(&self.extra_includes),
		)
	}

	/// Load a JSON profile from disk.
	pub fn load(path: &Path) -> Result<Config, SyncError> {
		let contents = std::fs::read_to_string(path)?;
		serde_json::from_str(&contents).map_err(|e| SyncError::Other {
			message: format!("Failed to parse config {:?}: {}", path, e),
		})
	}
}


// vim: ts=4
