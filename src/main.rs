//! `serial-link`: a terminal host for a [`PortSession`].
//!
//! Received frames are printed to stdout, one per line. Each line typed on
//! stdin is sent to the device using the selected `--mode`. Logs go to
//! stderr so stdout stays clean for piping.

use clap::{Parser, ValueEnum};
use serial_link::config::{ConfigLoader, LogFormat, LoggingConfig};
use serial_link::{LinkResult, PortConfig, PortSession};
use std::io::Write;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How stdin lines are turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SendMode {
    /// Text plus the configured newline
    Line,
    /// Space-separated hex bytes, e.g. "1A 2B FF"
    Hex,
    /// Low byte of each character's code point
    Chars,
    /// The raw line bytes, no newline
    Bytes,
}

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Talk to a serial device that sends 0xFF-terminated frames.",
    long_about = "Opens a serial port, prints every received frame on stdout and sends each stdin line to the device. Settings come from a TOML file, SERIAL_LINK_* environment variables and these flags, in increasing priority."
)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port name, e.g. /dev/ttyUSB0 or COM3.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// How stdin lines are encoded before sending.
    #[arg(short, long, value_enum, default_value_t = SendMode::Line)]
    mode: SendMode,

    /// Do not open the port on start-up.
    #[arg(long)]
    no_auto_open: bool,

    /// Log level or filter directive (overrides config and SERIAL_LINK_LOG_LEVEL).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config.logging);

    let link = resolve_link(config.link, &args)?;
    info!("Using {} at {} baud", link.port_name, link.baud_rate);

    let session = PortSession::with_system_port(link, |frame| {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{frame}");
        let _ = stdout.flush();
    });

    // `start` logs an open failure; the host keeps running and sends fail
    // with NotOpen until the device is available.
    session.start().ok();

    // A plain thread, so a pending stdin read never holds up runtime shutdown.
    let (tx, mut lines) = mpsc::unbounded_channel::<std::io::Result<String>>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(Ok(line)) => {
                    if let Err(e) = send(&session, args.mode, &line) {
                        error!("Send failed: {}", e);
                    }
                }
                Some(Err(e)) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }

    session.shutdown();
    info!("Session stats: {}", serde_json::to_string(&session.stats())?);
    Ok(())
}

fn resolve_link(
    from_config: Option<PortConfig>,
    args: &Args,
) -> Result<PortConfig, Box<dyn std::error::Error>> {
    let mut link = match (from_config, &args.port) {
        (Some(mut link), Some(port)) => {
            link.port_name = port.clone();
            link
        }
        (Some(link), None) => link,
        (None, Some(port)) => PortConfig::new(port.clone(), args.baud.unwrap_or(9600)),
        (None, None) => {
            return Err("no serial port given: use --port, SERIAL_LINK_PORT or a [link] config section".into())
        }
    };
    if let Some(baud) = args.baud {
        link.baud_rate = baud;
    }
    if args.no_auto_open {
        link.auto_open = false;
    }
    Ok(link)
}

fn send(session: &PortSession, mode: SendMode, line: &str) -> LinkResult<usize> {
    match mode {
        SendMode::Line => session.send_line(line),
        SendMode::Hex => session.send_hex_tokens(line.trim()),
        SendMode::Chars => session.send_char_codes(line),
        SendMode::Bytes => session.send_bytes(line.as_bytes()),
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
