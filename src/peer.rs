//! Peer transport: newline-delimited JSON frames over a child's stdio
//!
//! The client side spawns `reflectr serve <dir>` directly for a local peer
//! or through ssh for a remote one, then speaks [`PeerMessage`] frames
//! over the child's stdin/stdout. `serve` mode runs the same session with
//! the roles reversed, which keeps the protocol fully symmetric.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::fs_access::FileAccess;
use crate::logging::*;
use crate::tasks::{Step, TaskLogic};
use crate::types::{PeerMessage, PeerOutbound, Side, SyncItem};

/// Where the peer lives, parsed from a location string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerLocation {
	Local { path: String },
	Remote { host: String, path: String },
}

impl PeerLocation {
	/// `host:path` is remote, everything else local. Paths starting with
	/// `/`, `.` or `~` never parse as remote even with a colon in them.
	pub fn detect(location: &str) -> PeerLocation {
		let looks_like_path = location.starts_with('/')
			|| location.starts_with('.')
			|| location.starts_with('~');
		if !looks_like_path {
			if let Some(colon) = location.find(':') {
				return PeerLocation::Remote {
					host: location[..colon].to_string(),
					path: location[colon + 1..].to_string(),
				};
			}
		}
		PeerLocation::Local { path: location.to_string() }
	}
}

/// A spawned peer process with its stdio pipes.
pub struct PeerChild {
	pub send: tokio::process::ChildStdin,
	pub recv: BufReader<tokio::process::ChildStdout>,
	_child: tokio::process::Child,
}

/// Spawn the peer-side daemon for `location`.
pub async fn connect(location: &str, ssh_command: &str) -> Result<PeerChild, SyncError> {
	let peer = PeerLocation::detect(location);
	let mut child = match &peer {
		PeerLocation::Remote { host, path } => tokio::process::Command::new(ssh_command)
			.arg(host)
			.arg("reflectr")
			.arg("serve")
			.arg(path)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.spawn()
			.map_err(|e| SyncError::Other {
				message: format!("Failed to spawn ssh to {}: {}", host, e),
			})?,
		PeerLocation::Local { path } => tokio::process::Command::new("reflectr")
			.arg("serve")
			.arg(path)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.spawn()
			.map_err(|e| SyncError::Other {
				message: format!("Failed to spawn 'reflectr serve': {}", e),
			})?,
	};
	let send = child.stdin.take().ok_or(SyncError::Other {
		message: "Peer stdin unavailable".to_string(),
	})?;
	let stdout = child.stdout.take().ok_or(SyncError::Other {
		message: "Peer stdout unavailable".to_string(),
	})?;
	info!("Connected to peer at {:?}", peer);
	Ok(PeerChild { send, recv: BufReader::new(stdout), _child: child })
}

pub fn encode(message: &PeerMessage) -> Result<String, SyncError> {
	let mut line = serde_json::to_string(message).map_err(|e| SyncError::Other {
		message: format!("Failed to encode peer message: {}", e),
	})?;
	line.push('\n');
	Ok(line)
}

pub fn decode(line: &str) -> Result<PeerMessage, SyncError> {
	serde_json::from_str(line).map_err(|e| SyncError::ProtocolViolation {
		message: format!("Malformed peer frame: {}", e),
	})
}

/// Worker: reads peer frames and forwards them into the reconciler inbox.
pub struct PeerReader<R> {
	reader: R,
	inbox: mpsc::Sender<SyncItem>,
}

impl<R> PeerReader<R> {
	pub fn new(reader: R, inbox: mpsc::Sender<SyncItem>) -> PeerReader<R> {
		PeerReader { reader, inbox }
	}
}

#[async_trait]
impl<R> TaskLogic for PeerReader<R>
where
	R: AsyncBufRead + Unpin + Send + 'static,
{
	fn name(&self) -> &str {
		"peer-reader"
	}

	async fn step(&mut self) -> Result<Step, SyncError> {
		let mut line = String::new();
		let n = self.reader.read_line(&mut line).await.map_err(|e| {
			SyncError::ProducerFailure {
				task: "peer-reader".to_string(),
				message: e.to_string(),
			}
		})?;
		if n == 0 {
			return Err(SyncError::ProducerFailure {
				task: "peer-reader".to_string(),
				message: "peer disconnected".to_string(),
			});
		}
		let trimmed = line.trim();
		if trimmed.is_empty() {
			return Ok(Step::Continue);
		}
		let item = match decode(trimmed)? {
			PeerMessage::Update { update } => SyncItem::Update(Side::Remote, update),
			PeerMessage::ScanDone => SyncItem::ScanDone(Side::Remote),
		};
		self.inbox
			.send(item)
			.await
			.map_err(|_| SyncError::ChannelClosed { channel: "sync-inbox" })?;
		Ok(Step::Continue)
	}
}

/// Worker: encodes outbound messages, attaching file contents where the
/// reconciler asked for a content send.
pub struct PeerWriter<W> {
	writer: W,
	outbound: mpsc::Receiver<PeerOutbound>,
	fs: Arc<dyn FileAccess>,
}

impl<W> PeerWriter<W> {
	pub fn new(
		writer: W,
		outbound: mpsc::Receiver<PeerOutbound>,
		fs: Arc<dyn FileAccess>,
	) -> PeerWriter<W> {
		PeerWriter { writer, outbound, fs }
	}
}

#[async_trait]
impl<W> TaskLogic for PeerWriter<W>
where
	W: AsyncWrite + Unpin + Send + 'static,
{
	fn name(&self) -> &str {
		"peer-writer"
	}

	async fn step(&mut self) -> Result<Step, SyncError> {
		let outbound = match self.outbound.recv().await {
			Some(outbound) => outbound,
			None => return Ok(Step::Finished),
		};
		let frame = match outbound {
			PeerOutbound::Meta(update) => PeerMessage::Update { update },
			PeerOutbound::Content(mut update) => {
				match self.fs.read(&update.path).await {
					Ok((data, _)) => update.data = Some(data),
					Err(e) => {
						// The file may have changed under us; the watcher
						// will produce a fresh update for whatever it is now
						warn!("Skipping content send for {:?}: {}", update.path, e);
						return Ok(Step::Continue);
					}
				}
				PeerMessage::Update { update }
			}
			PeerOutbound::ScanDone => PeerMessage::ScanDone,
		};
		let line = encode(&frame)?;
		self.writer.write_all(line.as_bytes()).await.map_err(|e| {
			SyncError::ProducerFailure {
				task: "peer-writer".to_string(),
				message: e.to_string(),
			}
		})?;
		self.writer.flush().await.map_err(|e| SyncError::ProducerFailure {
			task: "peer-writer".to_string(),
			message: e.to_string(),
		})?;
		Ok(Step::Continue)
	}
}


// vim: ts=4
