use clap::{App, Arg, SubCommand};
use std::error::Error;
use std::sync::Arc;

use reflectr::config::Config;
use reflectr::fs_access::NativeFileAccess;
use reflectr::logging;
use reflectr::peer;
use reflectr::session::Session;
use reflectr::watch::FileWatcher;

fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = App::new("reflectr")
		.version("0.3")
		.about("Continuous 2-way directory mirror")
		.subcommand(
			SubCommand::with_name("serve")
				.about("Peer mode over stdio (used internally)")
				.arg(Arg::with_name("dir").required(true)),
		)
		.subcommand(
			SubCommand::with_name("sync")
				.about("Mirror a local directory against a peer (path or host:path)")
				.arg(Arg::with_name("local").required(true))
				.arg(Arg::with_name("remote").required(true)),
		)
		.get_matches();

	let runtime = tokio::runtime::Runtime::new()?;

	if let Some(matches) = matches.subcommand_matches("serve") {
		let dir = matches.value_of("dir").expect("required arg");
		runtime.block_on(serve(dir))?;
	} else if let Some(matches) = matches.subcommand_matches("sync") {
		let local = matches.value_of("local").expect("required arg");
		let remote = matches.value_of("remote").expect("required arg");
		runtime.block_on(sync(local, remote))?;
	} else {
		eprintln!("No subcommand given; try 'reflectr sync <local> <remote>'");
	}

	Ok(())
}

/// Client side: spawn the peer daemon and run a session against it.
async fn sync(local: &str, remote: &str) -> Result<(), Box<dyn Error>> {
	let config = Config::for_root(local);
	let fs = Arc::new(NativeFileAccess::new(&config.root));
	let peer = peer::connect(remote, &config.ssh_command).await?;
	let (_watcher, events) = FileWatcher::start(&config.root, config.watch_capacity)?;
	Session::start(&config, fs, peer.recv, peer.send, events).join().await?;
	Ok(())
}

/// Server side: same session, speaking the protocol over stdin/stdout.
/// All logging goes to stderr so stdout stays clean for frames.
async fn serve(dir: &str) -> Result<(), Box<dyn Error>> {
	let config = Config::for_root(dir);
	let fs = Arc::new(NativeFileAccess::new(&config.root));
	let (_watcher, events) = FileWatcher::start(&config.root, config.watch_capacity)?;
	let reader = tokio::io::BufReader::new(tokio::io::stdin());
	let writer = tokio::io::stdout();
	Session::start(&config, fs, reader, writer, events).join().await?;
	Ok(())
}

// vim: ts=4
