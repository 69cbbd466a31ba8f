//! Command-line front-end: source selection, logging, the event thread and
//! the interactive command loop.

mod render;
mod repl;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use argh::FromArgs;
use log::{LevelFilter, error, info, warn};
use modsift_core::capture::PcapReplay;
#[cfg(windows)]
use modsift_core::capture::{LiveCapture, divert_filter};
use modsift_core::constants::{DEFAULT_SLOTS, DEFAULT_TOP};
use modsift_core::{
	CaptureConfig, EngineConfig, EngineStats, Filter, Session, SessionConfig, SessionEvent,
	SessionState,
};
use parking_lot::RwLock;

/// Passive module inventory monitor and loadout optimizer.
#[derive(FromArgs)]
struct Args {
	/// replay packets from a pcap file
	#[argh(option)]
	pcap: Option<PathBuf>,

	/// capture live traffic (Windows, requires the WinDivert driver)
	#[argh(switch)]
	live: bool,

	/// narrow capture to this server TCP port
	#[argh(option)]
	port: Option<u16>,

	/// category to optimize: attack, guard or assist
	#[argh(option)]
	category: Option<String>,

	/// comma separated wanted attribute tokens, e.g. strength,crit-focus
	#[argh(option)]
	attrs: Option<String>,

	/// drop modules carrying any attribute outside the wanted set
	#[argh(switch)]
	exclusive: bool,

	/// loadout slot count
	#[argh(option, default = "DEFAULT_SLOTS")]
	slots: usize,

	/// number of ranked combinations to show
	#[argh(option, default = "DEFAULT_TOP")]
	top: usize,

	/// print results as JSON instead of text
	#[argh(switch)]
	json: bool,

	/// record observed packets to this pcap file
	#[argh(option)]
	dump: Option<PathBuf>,

	/// enable debug logging
	#[argh(switch)]
	debug: bool,
}

/// State shared between the event thread and the command loop.
pub struct Shared {
	pub filter: Filter,
	pub last_stats: Option<EngineStats>,
}

fn install_logging(debug: bool) {
	logforth::starter_log::builder()
		.dispatch(|d| {
			d.filter(logforth::record::LevelFilter::MoreSevereEqual(
				logforth::record::Level::Trace,
			))
				.append(logforth::append::Stderr::default())
		})
		.dispatch(|d| {
			d.filter(logforth::record::LevelFilter::MoreSevereEqual(
				logforth::record::Level::Trace,
			))
				.append(logforth::append::FastraceEvent::default())
		})
		.apply();
	log::set_max_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
}

fn initial_filter(args: &Args) -> Result<Filter, String> {
	let mut filter = Filter::new().with_exclusive(args.exclusive);
	if let Some(category) = &args.category {
		filter = filter.with_category(Some(category.parse()?));
	}
	if let Some(attrs) = &args.attrs {
		let wanted = attrs
			.split([',', ' '])
			.filter(|token| !token.is_empty())
			.map(str::parse)
			.collect::<Result<_, _>>()?;
		filter = filter.with_wanted(wanted);
	}
	Ok(filter)
}

fn spawn_event_thread(
	session: Session, events: kanal::Receiver<SessionEvent>, shared: Arc<RwLock<Shared>>,
	json: bool,
) {
	std::thread::spawn(move || {
		while let Ok(event) = events.recv() {
			match event {
				SessionEvent::ConnectionObserved(flow) => info!("Observing {flow}"),
				SessionEvent::LoginDetected => info!("Login detected, inventory captured"),
				SessionEvent::InventoryUpdated {
					revision,
					modules,
					full,
				} => {
					let kind = if full { "replaced" } else { "merged" };
					info!("Inventory {kind}: {modules} modules (revision {revision})");
					// Mirror the capture-then-optimize flow: every inventory
					// push re-runs the current filter.
					repl::refilter(&session, &shared, json);
				}
				SessionEvent::StreamStalled(flow) => {
					warn!("Stream {flow} lost bytes, resynchronizing")
				}
				SessionEvent::CaptureError(e) => error!("Capture failed: {e}"),
				SessionEvent::CaptureFinished => info!("Capture source finished"),
				SessionEvent::Stopped => break,
			}
		}
	});
}

#[tokio::main]
async fn main() -> ExitCode {
	let args: Args = argh::from_env();
	install_logging(args.debug);

	let filter = match initial_filter(&args) {
		Ok(filter) => filter,
		Err(e) => {
			eprintln!("{e}");
			return ExitCode::from(2);
		}
	};

	if args.live && args.pcap.is_some() {
		eprintln!("--live and --pcap are mutually exclusive");
		return ExitCode::from(2);
	}
	if args.live && cfg!(not(windows)) {
		eprintln!("--live is only available on Windows; use --pcap");
		return ExitCode::from(2);
	}
	if !args.live && args.pcap.is_none() {
		eprintln!("choose a packet source: --pcap <file> or --live");
		return ExitCode::from(2);
	}

	let config = SessionConfig {
		capture: CaptureConfig::new()
			.with_server_port(args.port)
			.with_dump_path(args.dump.clone()),
		engine: EngineConfig::new().with_slots(args.slots).with_top(args.top),
	};
	let (session, events) = Session::new(config);
	let shared = Arc::new(RwLock::new(Shared {
		filter,
		last_stats: None,
	}));

	spawn_event_thread(session.clone(), events, shared.clone(), args.json);

	#[cfg(windows)]
	let mut divert_shutdown = None;

	let mut pipeline;
	if let Some(path) = &args.pcap {
		let source = match PcapReplay::open(path) {
			Ok(source) => source,
			Err(e) => {
				error!("Cannot open {}: {e}", path.display());
				return ExitCode::FAILURE;
			}
		};
		info!("Replaying {}", path.display());
		pipeline = session.start(source);
	} else {
		#[cfg(not(windows))]
		{
			unreachable!("--live was rejected above on this platform");
		}
		#[cfg(windows)]
		{
			let source = match LiveCapture::open(args.port) {
				Ok(source) => source,
				Err(e) => {
					error!("Cannot start live capture: {e}");
					return ExitCode::FAILURE;
				}
			};
			// Take the shutdown handle before the capture task blocks in recv,
			// so Ctrl-C can always unblock it.
			divert_shutdown = Some(source.shutdown_handle());
			info!("Live capture started (filter: {})", divert_filter(args.port));
			pipeline = session.start(source);
		}
	}

	let (quit_tx, quit_rx) = kanal::unbounded::<()>();
	{
		let session = session.clone();
		let shared = shared.clone();
		let json = args.json;
		std::thread::spawn(move || repl::run(session, shared, json, quit_tx));
	}

	let quit_rx = quit_rx.to_async();
	tokio::select! {
		_ = &mut pipeline => {
			info!("Capture pipeline finished");
		}
		_ = tokio::signal::ctrl_c() => {
			info!("Ctrl-C received, stopping");
			session.stop();
			#[cfg(windows)]
			if let Some(handle) = divert_shutdown.take()
				&& let Err(e) = handle.shutdown()
			{
				error!("Failed to shut down the capture handle: {e}");
			}
			let _ = (&mut pipeline).await;
		}
		_ = quit_rx.recv() => {
			session.stop();
			#[cfg(windows)]
			if let Some(handle) = divert_shutdown.take()
				&& let Err(e) = handle.shutdown()
			{
				error!("Failed to shut down the capture handle: {e}");
			}
			let _ = (&mut pipeline).await;
		}
	}

	// A finished replay leaves the snapshot in place; keep the command loop
	// alive for more filter runs when someone is at the terminal.
	if session.state() != SessionState::Terminated && std::io::stdin().is_terminal() {
		info!("Enter a filter (e.g. 'attack strength crit-focus'), or 'quit' to exit");
		tokio::select! {
			_ = quit_rx.recv() => {}
			_ = tokio::signal::ctrl_c() => {}
		}
	}

	ExitCode::SUCCESS
}
