//! dflat CLI - Drive the file server from the host side.
//!
//! Usage:
//!   dflat [--root DIR | --image ZIP] [--config FILE] [--trace] <command>
//!
//! Examples:
//!   dflat --root card dir                         # List the card's root
//!   dflat --root card load HELLO.BAS -o hello.bas # Load a file
//!   dflat --root card save NEW.BAS -i new.bas     # Save a file
//!   dflat --image games.zip --cwd /GAMES/ dir     # List inside an image
//!   dflat --root card cd GAMES                    # Where a directory-open lands
//!
//! Every command is one selection of the server by a scripted host, run
//! through the real nibble protocol.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, LevelFilter};

use dflat_core::protocol::catalog::NAME_WIDTH;
use dflat_core::protocol::{directory_open_bytes, Command, CR, NUL};
use dflat_core::{
    load_image_from_path, FileServer, FileStore, HostDirStore, HostSession, ScriptedHost,
    ServerConfig, SessionEnd, SessionLog, State,
};

/// Upper bound on server polls for one command.
const POLL_BUDGET: usize = 100_000_000;

/// dflat file server CLI
#[derive(Parser, Debug)]
#[command(name = "dflat")]
#[command(about = "Serve a directory or disk image over the dflat protocol")]
struct Args {
    /// Directory to serve as the card (default: current directory)
    #[arg(long, conflicts_with = "image")]
    root: Option<PathBuf>,

    /// ZIP disk image to serve instead of a directory
    #[arg(long)]
    image: Option<PathBuf>,

    /// Server configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the server starts in, e.g. /GAMES/
    #[arg(long)]
    cwd: Option<String>,

    /// Busy-hold used to signal errors, in milliseconds
    #[arg(long)]
    error_hold_ms: Option<u64>,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Enable wire tracing
    #[arg(short, long)]
    trace: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// List the current directory
    Dir,
    /// Load a file from the server
    Load {
        name: String,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save a file to the server
    Save {
        name: String,
        /// File to send
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Delete a file
    Delete { name: String },
    /// Open a directory and print the resulting current path
    Cd { name: String },
}

/// What the host saw during one session.
struct Outcome {
    log: SessionLog,
    path: String,
    holds: usize,
}

fn init_logging(trace: bool) {
    let default_level = if trace {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn load_config(args: &Args) -> Result<ServerConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(cwd) = &args.cwd {
        config.root_path = cwd.clone();
    }
    if let Some(ms) = args.error_hold_ms {
        config.error_hold_ms = ms;
    }
    Ok(config)
}

fn host_session(action: &Action) -> Result<HostSession, Box<dyn Error>> {
    Ok(match action {
        Action::Dir => HostSession::list(),
        // Read until the server runs out of data and goes busy
        Action::Load { name, .. } => HostSession::with_filename(Command::OpenRead, name),
        Action::Save { name, input } => HostSession::save(name, &std::fs::read(input)?),
        Action::Delete { name } => HostSession::with_filename(Command::Delete, name),
        Action::Cd { name } => HostSession::open_dir(name),
    })
}

/// Run one host session against `store` on a blocking thread.
async fn exchange<S>(
    store: S,
    config: ServerConfig,
    session: HostSession,
    limit: Duration,
) -> Result<Outcome, Box<dyn Error>>
where
    S: FileStore + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        let host = ScriptedHost::with_sessions([session]);
        let mut server = FileServer::with_config(host, store, config);
        let settled = server.poll_until(POLL_BUDGET, |s| {
            s.lines().is_idle() && s.state() == State::WaitForSelect
        });
        let path = server.current_path().to_string();
        let (host, _store) = server.into_parts();
        (settled, path, host)
    });

    let (settled, path, host) = tokio::time::timeout(limit, task).await??;
    if !settled {
        return Err("server did not finish the session".into());
    }
    let log = host
        .logs()
        .first()
        .cloned()
        .ok_or("server was never selected")?;
    Ok(Outcome {
        log,
        path,
        holds: host.holds().len(),
    })
}

/// Print a listing one entry per line.
fn print_listing(received: &[u8]) -> Result<(), Box<dyn Error>> {
    let body = received
        .strip_suffix(&[CR, NUL])
        .ok_or("listing was cut short")?;
    let text = String::from_utf8_lossy(body);
    let fields: Vec<&str> = text.split_whitespace().collect();
    for entry in fields.chunks(2) {
        match entry {
            [name, size] => println!("{:<width$}{}", name, size, width = NAME_WIDTH),
            [name] => println!("{}", name),
            _ => {}
        }
    }
    Ok(())
}

fn report(action: &Action, outcome: Outcome) -> Result<(), Box<dyn Error>> {
    let Outcome { log, path, holds } = outcome;
    match action {
        Action::Dir => print_listing(&log.received)?,
        Action::Load { name, output } => {
            if log.received.is_empty() {
                return Err(format!("{}: no data (missing or empty)", name).into());
            }
            match output {
                Some(out) => {
                    std::fs::write(out, &log.received)?;
                    info!("Loaded {} ({} bytes) to {}", name, log.received.len(), out.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    handle.write_all(&log.received)?;
                    handle.flush()?;
                }
            }
        }
        Action::Save { name, .. } => {
            if holds > 0 || log.end != SessionEnd::Drained {
                return Err(format!("server refused {}", name).into());
            }
            // The command byte, the name and its nul precede the payload
            let payload = log.sent.saturating_sub(name.len() + 2);
            info!("Saved {} ({} bytes)", name, payload);
        }
        Action::Delete { name } => {
            if holds > 0 {
                return Err(format!("{}: not found", name).into());
            }
            info!("Deleted {}", name);
        }
        Action::Cd { name } => {
            if log.received != directory_open_bytes() {
                return Err(format!("{}: not a directory", name).into());
            }
            println!("{}", path);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.trace);

    let config = load_config(&args)?;
    let session = host_session(&args.action)?;
    let limit = Duration::from_secs(args.timeout);

    let outcome = match &args.image {
        Some(image) => {
            let store = load_image_from_path(image)?;
            info!("Serving image {} ({} entries)", image.display(), store.len());
            exchange(store, config, session, limit).await?
        }
        None => {
            let root = args.root.clone().unwrap_or_else(|| PathBuf::from("."));
            let store = HostDirStore::new(&root)?;
            info!("Serving {}", root.display());
            exchange(store, config, session, limit).await?
        }
    };

    report(&args.action, outcome)
}
