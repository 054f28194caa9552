//! Core data types: the `Update` metadata record and the message enums
//! that flow between session workers.

use serde::{Deserialize, Serialize};

/// Which side of the mirror an update describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Local,
	Remote,
}

impl std::fmt::Display for Side {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Side::Local => write!(f, "local"),
			Side::Remote => write!(f, "remote"),
		}
	}
}

/// What a node currently is, derived from an update's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
	File,
	Directory,
	Symlink,
}

/// One unit of file/directory metadata exchanged between peers.
///
/// `path` is slash-separated and relative to the sync root; the empty
/// string denotes the root itself. `data` is a payload carrier only: it is
/// present when an update transports file contents and is cleared by the
/// reconciler as soon as the contents have been dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Update {
	pub path: String,

	/// Modification time in milliseconds. Monotone within one machine's
	/// view of a path; compared across machines for conflict resolution.
	pub mod_time: i64,

	pub directory: bool,

	/// Symlink target; empty iff the path is not a symlink.
	pub symlink: String,

	/// Tombstone flag: the path ceased to exist.
	pub delete: bool,

	/// Textual ignore rules; only meaningful for `.gitignore` files.
	pub ignore_string: String,

	/// Optional content payload, base64 on the wire.
	#[serde(with = "base64_bytes", skip_serializing_if = "Option::is_none")]
	pub data: Option<Vec<u8>>,
}

impl Update {
	pub fn file(path: &str, mod_time: i64) -> Update {
		Update { path: path.to_string(), mod_time, ..Update::default() }
	}

	pub fn directory(path: &str, mod_time: i64) -> Update {
		Update { path: path.to_string(), mod_time, directory: true, ..Update::default() }
	}

	pub fn symlink(path: &str, target: &str, mod_time: i64) -> Update {
		Update {
			path: path.to_string(),
			mod_time,
			symlink: target.to_string(),
			..Update::default()
		}
	}

	pub fn tombstone(path: &str, mod_time: i64) -> Update {
		Update { path: path.to_string(), mod_time, delete: true, ..Update::default() }
	}

	pub fn with_data(mut self, data: Vec<u8>) -> Update {
		self.data = Some(data);
		self
	}

	pub fn with_ignore_string(mut self, text: &str) -> Update {
		self.ignore_string = text.to_string();
		self
	}

	/// Directory beats symlink beats plain file.
	pub fn node_type(&self) -> NodeType {
		if self.directory {
			NodeType::Directory
		} else if !self.symlink.is_empty() {
			NodeType::Symlink
		} else {
			NodeType::File
		}
	}

	pub fn is_file(&self) -> bool {
		self.node_type() == NodeType::File
	}

	/// Last path segment; empty for the root.
	pub fn file_name(&self) -> &str {
		self.path.rsplit('/').next().unwrap_or("")
	}

	pub fn is_gitignore(&self) -> bool {
		self.file_name() == ".gitignore"
	}

	/// Copy of this update with the payload stripped.
	pub fn meta_clone(&self) -> Update {
		Update { data: None, ..self.clone() }
	}
}

/// Wire frame exchanged with the peer, one JSON object per line.
///
/// Field names are part of the wire contract; renaming them breaks
/// compatibility with older peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PeerMessage {
	/// Metadata (and optionally content) for one path.
	Update { update: Update },

	/// All initial-scan updates from this side have been delivered.
	ScanDone,
}

/// Item in the reconciler's inbox, merged from all producers.
#[derive(Debug)]
pub enum SyncItem {
	/// A metadata update from one side (scanner, watcher or peer).
	Update(Side, Update),

	/// End-of-initial-scan sentinel for one side.
	ScanDone(Side),

	/// The filesystem writer could not apply this remote update; the
	/// reconciler re-queues the node for a later retry.
	ApplyFailed(Update),
}

/// Message for the peer-writer worker.
#[derive(Debug)]
pub enum PeerOutbound {
	/// Ship as-is (scan tee, tombstones, directories, symlinks).
	Meta(Update),

	/// Attach the file's bytes from the local filesystem before shipping.
	Content(Update),

	/// Forward the end-of-scan sentinel.
	ScanDone,
}

/// Filesystem mutation, serialized through the single fs-writer worker.
///
/// Each variant carries the originating update so a failed application can
/// be handed back to the reconciler intact.
#[derive(Debug, Clone)]
pub enum FsOp {
	Mkdir(Update),
	Write(Update),
	Mklink(Update),
	Delete(Update),
}

impl FsOp {
	pub fn update(&self) -> &Update {
		match self {
			FsOp::Mkdir(u) | FsOp::Write(u) | FsOp::Mklink(u) | FsOp::Delete(u) => u,
		}
	}

	pub fn into_update(self) -> Update {
		match self {
			FsOp::Mkdir(u) | FsOp::Write(u) | FsOp::Mklink(u) | FsOp::Delete(u) => u,
		}
	}
}

mod base64_bytes {
	use base64::engine::general_purpose::STANDARD;
	use base64::Engine;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(
		data: &Option<Vec<u8>>,
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		match data {
			Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Option<Vec<u8>>, D::Error> {
		let text: Option<String> = Option::deserialize(deserializer)?;
		match text {
			Some(text) => STANDARD
				.decode(text.as_bytes())
				.map(Some)
				.map_err(serde::de::Error::custom),
			None => Ok(None),
		}
	}
}


// vim: ts=4
