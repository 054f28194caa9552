//! Error types for reflectr operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for the sync engine
#[derive(Debug)]
pub enum SyncError {
	/// Tree mutation rejected (nested)
	Tree(TreeError),

	/// Task supervision error (nested)
	Task(TaskError),

	/// Peer sent a malformed or impossible message; session-fatal
	ProtocolViolation { message: String },

	/// A producer's underlying I/O failed; surfaces through the task's
	/// failure hook and tears the session down
	ProducerFailure { task: String, message: String },

	/// An inter-worker channel closed while the session was still live
	ChannelClosed { channel: &'static str },

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Tree(e) => write!(f, "Tree error: {}", e),
			SyncError::Task(e) => write!(f, "Task error: {}", e),
			SyncError::ProtocolViolation { message } => {
				write!(f, "Protocol violation: {}", message)
			}
			SyncError::ProducerFailure { task, message } => {
				write!(f, "Worker '{}' failed: {}", task, message)
			}
			SyncError::ChannelClosed { channel } => {
				write!(f, "Channel '{}' closed unexpectedly", channel)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<TreeError> for SyncError {
	fn from(e: TreeError) -> Self {
		SyncError::Tree(e)
	}
}

impl From<TaskError> for SyncError {
	fn from(e: TaskError) -> Self {
		SyncError::Task(e)
	}
}

impl From<String> for SyncError {
	fn from(message: String) -> Self {
		SyncError::Other { message }
	}
}

/// Errors raised by UpdateTree mutations
///
/// Both variants are programming errors on the local side; when the remote
/// peer triggers one it is reported as a protocol violation instead.
#[derive(Debug)]
pub enum TreeError {
	/// Path starts or ends with '/', or escapes the root via ".."
	InvalidPath { path: String },

	/// An update's embedded path disagrees with the node it was applied to
	PathMismatch { node: String, update: String },
}

impl fmt::Display for TreeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TreeError::InvalidPath { path } => {
				write!(f, "Invalid update path: {:?}", path)
			}
			TreeError::PathMismatch { node, update } => {
				write!(f, "Update path {:?} does not match node path {:?}", update, node)
			}
		}
	}
}

impl Error for TreeError {}

/// Task supervision errors
#[derive(Debug)]
pub enum TaskError {
	/// Stop requested for a task that was never started
	NoSuchTask { name: String },
}

impl fmt::Display for TaskError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TaskError::NoSuchTask { name } => write!(f, "No task found for '{}'", name),
		}
	}
}

impl Error for TaskError {}

// vim: ts=4
