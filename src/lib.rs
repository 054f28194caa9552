//! # reflectr - Continuous 2-way Directory Mirror
//!
//! reflectr keeps two directory trees, one local and one on a remote peer,
//! continuously synchronized in both directions. Each side scans its
//! filesystem at startup, exchanges metadata with the peer, reconciles the
//! differences, then streams incremental changes as they happen. Conflicts
//! resolve by modification time; `.gitignore` files found inside the tree
//! gate what is mirrored, on top of configurable include/exclude rules.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reflectr::{config::Config, fs_access::NativeFileAccess, session::Session, watch::FileWatcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_root("./mirror");
//!     let fs = Arc::new(NativeFileAccess::new(&config.root));
//!     let peer = reflectr::peer::connect("host:/data/mirror", &config.ssh_command).await?;
//!     let (_watcher, events) = FileWatcher::start(&config.root, config.watch_capacity)?;
//!     Session::start(&config, fs, peer.recv, peer.send, events).join().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fs_access;
pub mod logging;
pub mod peer;
pub mod rules;
pub mod session;
pub mod sync;
pub mod tasks;
pub mod tree;
pub mod types;
pub mod watch;

// Re-export commonly used types
pub use config::Config;
pub use error::{SyncError, TaskError, TreeError};
pub use rules::PathRules;
pub use sync::{classify, SyncLogic, SyncStatus};
pub use tree::{Node, UpdateTree};
pub use types::{FsOp, NodeType, PeerMessage, PeerOutbound, Side, SyncItem, Update};

// vim: ts=4
