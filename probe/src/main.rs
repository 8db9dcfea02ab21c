use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{never, select, Receiver, RecvError};
use deskprim_core::{
    ClipboardUpdate, DisplayChange, DpiChange, EnvironmentChange, StandardFormat, Subscription,
};
use deskprim_platform::services;
use deskprim_platform::{extract_icon, icon_count, list_windows, IconSize, MessageLoopHandle};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use tracing::info;

#[derive(Parser)]
#[command(name = "deskprim-probe")]
#[command(about = "Clipboard, window message and window inspection tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the formats currently on the clipboard
    Formats,
    /// Print the payload stored under a format
    Read {
        /// Format name, e.g. CF_UNICODETEXT or "HTML Format"
        format: String,
        /// Decode as CF_UNICODETEXT instead of dumping bytes
        #[arg(long)]
        text: bool,
    },
    /// Replace the clipboard contents with one value
    Write {
        format: String,
        value: String,
        /// Store as CF_UNICODETEXT, ignoring FORMAT
        #[arg(long)]
        text: bool,
        /// Add to the current contents instead of clearing them first
        #[arg(long)]
        keep: bool,
    },
    /// Empty the clipboard
    Clear,
    /// Print change events as JSON lines (all streams if none selected)
    Watch {
        #[arg(long)]
        clipboard: bool,
        #[arg(long)]
        environment: bool,
        #[arg(long)]
        dpi: bool,
        #[arg(long)]
        display: bool,
        /// Stop after N events
        #[arg(short, long)]
        max_events: Option<usize>,
    },
    /// List visible top-level windows
    Windows {
        /// Case-insensitive match on title, class or process
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Inspect the icons of an executable, DLL or .ico file
    Icon {
        path: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        index: u32,
        #[arg(long)]
        small: bool,
    },
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskprim_probe=info,deskprim_core=info,deskprim_platform=info".into()),
        )
        .try_init();
}

fn main() -> Result<()> {
    init_logging();

    match Cli::parse().command {
        Commands::Formats => run_formats(),
        Commands::Read { format, text } => run_read(&format, text),
        Commands::Write {
            format,
            value,
            text,
            keep,
        } => run_write(&format, &value, text, keep),
        Commands::Clear => run_clear(),
        Commands::Watch {
            clipboard,
            environment,
            dpi,
            display,
            max_events,
        } => {
            let all = !(clipboard || environment || dpi || display);
            run_watch(
                Streams {
                    clipboard: clipboard || all,
                    environment: environment || all,
                    dpi: dpi || all,
                    display: display || all,
                },
                max_events,
            )
        }
        Commands::Windows { filter } => run_windows(filter.as_deref()),
        Commands::Icon { path, index, small } => run_icon(path, index, small),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn run_formats() -> Result<()> {
    let session = services::clipboard()?.open().context("opening clipboard")?;
    for format in session.available_formats()? {
        print_json(&format)?;
    }
    session.close()?;
    Ok(())
}

fn run_read(format: &str, text: bool) -> Result<()> {
    let session = services::clipboard()?.open().context("opening clipboard")?;
    if text {
        println!("{}", session.read_text()?);
    } else {
        let bytes = session
            .read(format)
            .with_context(|| format!("reading {format}"))?;
        println!("{} bytes", bytes.len());
        for line in bytes.chunks(16) {
            let hex: Vec<String> = line.iter().map(|b| format!("{b:02x}")).collect();
            println!("{}", hex.join(" "));
        }
    }
    session.close()?;
    Ok(())
}

fn run_write(format: &str, value: &str, text: bool, keep: bool) -> Result<()> {
    let mut session = services::clipboard()?.open().context("opening clipboard")?;
    if !keep {
        session.clear()?;
    }
    if text || format == StandardFormat::UnicodeText.name() {
        session.write_text(value)?;
    } else {
        session
            .write(format, value.as_bytes())
            .with_context(|| format!("writing {format}"))?;
    }
    session.close()?;
    info!(format, len = value.len(), "Clipboard written");
    Ok(())
}

fn run_clear() -> Result<()> {
    let mut session = services::clipboard()?.open().context("opening clipboard")?;
    session.clear()?;
    session.close()?;
    Ok(())
}

struct Streams {
    clipboard: bool,
    environment: bool,
    dpi: bool,
    display: bool,
}

#[derive(Serialize)]
struct WatchEvent<'a, E> {
    stream: &'a str,
    event: E,
}

fn emit<E: Serialize>(stream: &str, event: Result<E, RecvError>) -> Result<bool> {
    match event {
        Ok(event) => {
            print_json(&WatchEvent { stream, event })?;
            Ok(true)
        }
        Err(RecvError) => Ok(false),
    }
}

fn channel_for<E: Clone + Send + 'static>(
    enabled: bool,
    monitor: &deskprim_core::ChangeBroadcaster<E>,
    subscriptions: &mut Vec<Subscription>,
) -> Result<Receiver<E>> {
    if !enabled {
        return Ok(never());
    }
    let (subscription, rx) = monitor
        .subscribe_channel()
        .with_context(|| format!("subscribing to {} changes", monitor.name()))?;
    subscriptions.push(subscription);
    Ok(rx)
}

struct WatchChannels {
    clipboard: Receiver<ClipboardUpdate>,
    environment: Receiver<EnvironmentChange>,
    dpi: Receiver<DpiChange>,
    display: Receiver<DisplayChange>,
}

/// Print events until a stream closes or `max_events` have been printed.
fn print_events(channels: WatchChannels, max_events: Option<usize>) -> Result<()> {
    let mut seen = 0usize;
    loop {
        let delivered = select! {
            recv(channels.clipboard) -> event => emit("clipboard", event)?,
            recv(channels.environment) -> event => emit("environment", event)?,
            recv(channels.dpi) -> event => emit("dpi", event)?,
            recv(channels.display) -> event => emit("display", event)?,
        };
        // A closed stream means the watch is over.
        if !delivered {
            return Ok(());
        }
        seen += 1;
        if max_events.is_some_and(|max| seen >= max) {
            return Ok(());
        }
    }
}

fn run_watch(streams: Streams, max_events: Option<usize>) -> Result<()> {
    deskprim_platform::set_dpi_aware();

    let mut subscriptions = Vec::new();
    let channels = WatchChannels {
        clipboard: channel_for(streams.clipboard, &services::clipboard_updates(), &mut subscriptions)?,
        environment: channel_for(streams.environment, &services::environment_changes(), &mut subscriptions)?,
        dpi: channel_for(streams.dpi, &services::dpi_changes(), &mut subscriptions)?,
        display: channel_for(streams.display, &services::display_changes(), &mut subscriptions)?,
    };
    if subscriptions.is_empty() {
        bail!("no change stream selected");
    }

    let message_loop = MessageLoopHandle::current();
    let printer = thread::spawn(move || -> Result<()> {
        let result = print_events(channels, max_events);
        // Stop the loop on every exit, errors included.
        message_loop.quit();
        result
    });

    eprintln!("watching {} stream(s), stop with Ctrl+C", subscriptions.len());
    deskprim_platform::run_message_loop()?;
    drop(subscriptions);

    match printer.join() {
        Ok(result) => result,
        Err(_) => bail!("event printer panicked"),
    }
}

fn run_windows(filter: Option<&str>) -> Result<()> {
    for window in list_windows()
        .into_iter()
        .filter(|w| filter.map_or(true, |f| w.matches(f)))
    {
        print_json(&window)?;
    }
    Ok(())
}

fn run_icon(path: PathBuf, index: u32, small: bool) -> Result<()> {
    let count = icon_count(&path);
    println!("{}: {count} icon(s)", path.display());
    let size = if small { IconSize::Small } else { IconSize::Large };
    match extract_icon(&path, index, size)? {
        Some(icon) => println!("icon {index}: handle {:#x} ({size:?})", icon.handle()),
        None => println!("icon {index}: not present"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_write() {
        let cli = Cli::try_parse_from(["deskprim-probe", "write", "HTML Format", "<b>x</b>", "--keep"]).unwrap();
        match cli.command {
            Commands::Write { format, value, text, keep } => {
                assert_eq!(format, "HTML Format");
                assert_eq!(value, "<b>x</b>");
                assert!(!text);
                assert!(keep);
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_printer_stops_when_a_stream_closes() {
        let (clipboard_tx, clipboard) = crossbeam_channel::bounded::<ClipboardUpdate>(1);
        drop(clipboard_tx);
        let channels = WatchChannels {
            clipboard,
            environment: never(),
            dpi: never(),
            display: never(),
        };
        assert!(print_events(channels, None).is_ok());
    }

    #[test]
    fn test_printer_stops_after_max_events() {
        let (dpi_tx, dpi) = crossbeam_channel::bounded(2);
        dpi_tx
            .send(DpiChange { dpi_x: 144, dpi_y: 144, suggested: None })
            .unwrap();
        let channels = WatchChannels {
            clipboard: never(),
            environment: never(),
            dpi,
            display: never(),
        };
        assert!(print_events(channels, Some(1)).is_ok());
    }

    #[test]
    fn test_emit_reports_closed_stream() {
        assert!(!emit::<u32>("dpi", Err(RecvError)).unwrap());
        assert!(emit("dpi", Ok(96u32)).unwrap());
    }
}
