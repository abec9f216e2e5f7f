//! `serial-term`: interactive serial terminal.
//!
//! Received data is rendered to stdout. Lines typed on stdin are sent to the
//! port; lines starting with `:` are commands (`:help` lists them).

use clap::Parser;
use futures::StreamExt;
use serial_terminal::config::{Config, ConfigLoader, ConfigResult};
use serial_terminal::display::{
    error_notice, notice, DisplaySink, LogFileSink, SharedPipeline, TeeSink, TerminalSink,
};
use serial_terminal::port::{list_ports, DataBits, FlowControl, Parity, PortError, StopBits};
use serial_terminal::{
    logging, AppError, AppResult, DisplayMode, ManualSend, SerialTerminal, TerminalOptions,
    TransmitEvent, TransmitHandle,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

type Terminal = SerialTerminal<Box<dyn DisplaySink>>;

const HELP: &str = "Commands: :hex <bytes>  :mode text|hex  :ts on|off  :file <path>  \
:cancel  :clear  :export  :quit  (start a line with :: to send a literal ':')";

#[derive(Parser, Debug)]
#[command(
    name = "serial-term",
    version,
    about = "Serial terminal with text, timestamped and hex dump views.",
    long_about = "Opens a serial port, renders received data as text, timestamped text or a hex dump, \
and sends typed lines, hex strings or whole files with paced bulk transmit."
)]
struct Args {
    /// Serial port to open (device name or configured alias)
    #[arg(required_unless_present = "list")]
    port: Option<String>,

    /// List available serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits: 5, 6, 7 or 8
    #[arg(long)]
    data_bits: Option<DataBits>,

    /// Parity: none, odd or even
    #[arg(long)]
    parity: Option<Parity>,

    /// Stop bits: 1 or 2
    #[arg(long)]
    stop_bits: Option<StopBits>,

    /// Flow control: none, software or hardware
    #[arg(long)]
    flow_control: Option<FlowControl>,

    /// Display mode: text or hex
    #[arg(short, long)]
    mode: Option<DisplayMode>,

    /// Prefix text lines with their arrival time
    #[arg(short, long)]
    timestamps: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Also write the rendered display to this file
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Send this file once connected
    #[arg(long)]
    send_file: Option<PathBuf>,
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Send(String),
    Hex(String),
    Mode(DisplayMode),
    Timestamps(bool),
    File(PathBuf),
    Cancel,
    Clear,
    Export,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Send(line.to_string()));
    };
    if rest.starts_with(':') {
        return Ok(Command::Send(rest.to_string()));
    }

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest.trim(), ""),
    };
    match name {
        "hex" if arg.is_empty() => Err("usage: :hex <bytes>".to_string()),
        "hex" => Ok(Command::Hex(arg.to_string())),
        "mode" => arg.parse().map(Command::Mode),
        "ts" => match arg {
            "on" | "true" | "1" => Ok(Command::Timestamps(true)),
            "off" | "false" | "0" => Ok(Command::Timestamps(false)),
            _ => Err("usage: :ts on|off".to_string()),
        },
        "file" if arg.is_empty() => Err("usage: :file <path>".to_string()),
        "file" => Ok(Command::File(PathBuf::from(arg))),
        "cancel" => Ok(Command::Cancel),
        "clear" => Ok(Command::Clear),
        "export" => Ok(Command::Export),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command :{other}, try :help")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> AppResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args)?;
    logging::init(&config.logging)?;

    if args.list {
        for port in list_ports()? {
            println!("{}\t{}", port.name, port.kind);
        }
        return Ok(());
    }

    let port = args
        .port
        .as_deref()
        .map(|p| config.serial.resolve_port(p))
        .ok_or_else(|| PortError::config("no port given"))?;

    let sink: Box<dyn DisplaySink> = match &args.capture {
        Some(path) => Box::new(
            TeeSink::new()
                .with(TerminalSink::stdout())
                .with(LogFileSink::create(path)?),
        ),
        None => Box::new(TerminalSink::stdout()),
    };

    let mut terminal = SerialTerminal::new(sink, TerminalOptions::from(&config));
    if let Err(e) = terminal.open(&port, &config.serial.port_configuration()) {
        terminal.shutdown().await;
        return Err(e);
    }

    if let Some(path) = &args.send_file {
        start_bulk(&mut terminal, path).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&mut terminal, &config, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    terminal.shutdown().await;
    Ok(())
}

fn load_config(path: Option<&Path>) -> AppResult<Config> {
    if let Some(path) = path {
        return Ok(ConfigLoader::load_from(path)?.into_config());
    }
    Ok(match ConfigLoader::load() {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            ConfigLoader::with_defaults().into_config()
        }
    })
}

/// Command-line flags win over the config file. The merged result is
/// validated again.
fn apply_args(config: &mut Config, args: &Args) -> ConfigResult<()> {
    if let Some(baud) = args.baud {
        config.serial.default_baud = baud;
    }
    if let Some(bits) = args.data_bits {
        config.serial.data_bits = bits;
    }
    if let Some(parity) = args.parity {
        config.serial.parity = parity;
    }
    if let Some(bits) = args.stop_bits {
        config.serial.stop_bits = bits;
    }
    if let Some(flow) = args.flow_control {
        config.serial.flow_control = flow;
    }
    if let Some(mode) = args.mode {
        config.display.mode = mode;
    }
    if args.timestamps {
        config.display.timestamps = true;
    }
    if let Some(path) = &args.log_file {
        config.logging.file = Some(path.clone());
    }
    config.validate()
}

/// Returns `false` when the session should end.
async fn handle_line(terminal: &mut Terminal, config: &Config, line: &str) -> bool {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(message) => {
            terminal.error_notice(&message);
            return true;
        }
    };

    let result: AppResult<()> = match command {
        Command::Send(text) => {
            let request = ManualSend::Text {
                text,
                expand_escapes: config.transmit.expand_escapes,
                append_crlf: config.transmit.append_crlf,
            };
            terminal.send(&request).await.map(drop)
        }
        Command::Hex(input) => terminal.send(&ManualSend::Hex(input)).await.map(drop),
        Command::Mode(mode) => {
            terminal.set_mode(mode);
            Ok(())
        }
        Command::Timestamps(on) => {
            terminal.set_timestamps(on);
            Ok(())
        }
        Command::File(path) => {
            start_bulk(terminal, &path).await;
            Ok(())
        }
        Command::Cancel => {
            if !terminal.cancel_transmit() {
                terminal.notice("No transmit in progress");
            }
            Ok(())
        }
        Command::Clear => {
            terminal.clear();
            Ok(())
        }
        Command::Export => terminal.export_to_dir().map(|path| {
            terminal.notice(&format!("Exported to {}", path.display()));
        }),
        Command::Help => {
            terminal.notice(HELP);
            Ok(())
        }
        Command::Quit => return false,
    };

    if let Err(e) = result {
        terminal.error_notice(&e.to_string());
        if matches!(e, AppError::Port(PortError::Closed)) {
            return false;
        }
    }
    true
}

async fn start_bulk(terminal: &mut Terminal, path: &Path) {
    match terminal.send_file(path).await {
        Ok(handle) => {
            tokio::spawn(report_progress(handle, terminal.pipeline()));
        }
        Err(e) => terminal.error_notice(&format!("Cannot send {}: {e}", path.display())),
    }
}

/// Log progress and put the outcome on the display.
async fn report_progress(
    mut handle: TransmitHandle,
    pipeline: SharedPipeline<Box<dyn DisplaySink>>,
) {
    let mut events = handle.events();
    while let Some(event) = events.next().await {
        match &event {
            TransmitEvent::Progress { .. } => debug!("{}", event.summary()),
            TransmitEvent::Failed { .. } => pipeline.lock().notice(&error_notice(&event.summary())),
            _ => pipeline.lock().notice(&notice(&event.summary())),
        }
    }
}
