//! motionctl CLI - serves and sends motion commands over a local socket.
//!
//! This is the main binary entry point. See the `motionctl` library for
//! the core functionality.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use motionctl::constants::{CLIENT_REPLY_TIMEOUT, COMMAND_COOLDOWN};
use motionctl::shutdown::install_signal_handlers;
use motionctl::socket::client::{probe, send_commands, CommandClient, CommandThrottle};
use motionctl::{AuditSink, ConsoleExecutor, Controller, Direction, Dispatcher, ServerConfig};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "motionctl")]
#[command(version)]
#[command(about = "Local command channel between a motion front end and a game controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the command server until interrupted
    Serve(ServeArgs),
    /// Send commands to a running server
    Send {
        /// Socket path of the server
        #[arg(short = 'p', long = "pipe")]
        pipe: Option<PathBuf>,
        /// Don't wait for replies (inbound-only servers)
        #[arg(long)]
        no_reply: bool,
        /// Read commands line by line from stdin
        #[arg(long)]
        stdin: bool,
        /// Drop repeats of the same stdin command within this many milliseconds
        #[arg(long, default_value_t = duration_millis(COMMAND_COOLDOWN))]
        cooldown_ms: u64,
        /// Commands to send, in order
        commands: Vec<String>,
    },
    /// Check whether a server is listening
    Status {
        /// Socket path of the server
        #[arg(short = 'p', long = "pipe")]
        pipe: Option<PathBuf>,
    },
    /// Print the effective server configuration as JSON
    Config(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct ServeArgs {
    /// Game / client label
    #[arg(short = 'g', long)]
    game: Option<String>,
    /// Sensitivity threshold (reserved for the action executor)
    #[arg(short = 't', long)]
    threshold: Option<f64>,
    /// Target frame rate (reserved for the action executor)
    #[arg(short = 'f', long)]
    fps: Option<u32>,
    /// Socket path
    #[arg(short = 'p', long = "pipe")]
    pipe: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,
    /// Append the audit trail to this file
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,
    /// Accept commands without sending replies
    #[arg(long)]
    inbound_only: bool,
    /// Largest frame in bytes; longer input is split
    #[arg(long)]
    max_frame_size: Option<usize>,
    /// End a session after this many consecutive read errors
    #[arg(long)]
    max_read_errors: Option<u32>,
    /// Delay between read retries in milliseconds
    #[arg(long)]
    read_retry_ms: Option<u64>,
    /// Recreate the endpoint if no client connects within this many seconds
    #[arg(long)]
    accept_timeout: Option<u64>,
}

impl ServeArgs {
    /// Layer the flags over defaults and environment overrides.
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::load();

        if let Some(game) = self.game {
            config.game = game;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(pipe) = self.pipe {
            config.endpoint.path = pipe;
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = Some(log_file);
        }
        if self.inbound_only {
            config.endpoint.direction = Direction::InboundOnly;
        }
        if let Some(size) = self.max_frame_size {
            config.endpoint.max_frame_size = size;
        }
        if let Some(max) = self.max_read_errors {
            config.read_retry.max_consecutive_errors = Some(max);
        }
        if let Some(ms) = self.read_retry_ms {
            config.read_retry.delay_ms = ms;
        }
        if let Some(secs) = self.accept_timeout {
            config.accept_timeout_secs = Some(secs);
        }

        config
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

fn socket_path(pipe: Option<PathBuf>) -> PathBuf {
    pipe.unwrap_or_else(|| ServerConfig::load().endpoint.path)
}

/// Run the server until a shutdown signal arrives.
fn run_server(config: ServerConfig) -> Result<i32> {
    println!("=== motionctl v{} ===", env!("CARGO_PKG_VERSION"));
    println!("Game:      {}", config.game);
    println!("Socket:    {}", config.endpoint.path.display());
    println!("Direction: {}", config.endpoint.direction);
    println!("Debug:     {}", if config.debug { "ON" } else { "OFF" });
    if let Some(log_file) = &config.log_file {
        println!("Audit log: {}", log_file.display());
    }
    println!("Press Ctrl+C to stop");
    println!();

    // Register before binding so an early signal still cleans up.
    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone())?;

    log::debug!(
        "Reserved executor settings: threshold={} fps={}",
        config.threshold,
        config.fps
    );

    let dispatcher = Dispatcher::new(
        AuditSink::new(config.log_file.clone()),
        Box::new(ConsoleExecutor::new(config.game.clone())),
    );
    let controller = Controller::new(config, dispatcher);

    Ok(runtime()?.block_on(controller.run(shutdown)))
}

/// Send commands from the CLI or stdin.
async fn run_send(
    path: PathBuf,
    commands: Vec<String>,
    no_reply: bool,
    from_stdin: bool,
    cooldown: Duration,
) -> Result<()> {
    if !from_stdin {
        if commands.is_empty() {
            bail!("No commands given (pass COMMAND... or --stdin)");
        }
        let replies = send_commands(&path, &commands, !no_reply, CLIENT_REPLY_TIMEOUT).await?;
        for reply in replies {
            println!("{reply}");
        }
        return Ok(());
    }

    let mut client = CommandClient::connect(&path, CLIENT_REPLY_TIMEOUT).await?;
    let mut throttle = CommandThrottle::new(cooldown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if !throttle.should_send(command, Instant::now()) {
            log::debug!("[Client] Suppressed repeat of {command}");
            continue;
        }
        if no_reply {
            client.send(command).await?;
        } else {
            println!("{}", client.request(command).await?);
        }
    }

    client.close().await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = args.into_config();
            init_logging(config.debug);

            let default_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |panic_info| {
                log::error!("PANIC: {:?}", panic_info);
                default_hook(panic_info);
            }));

            let code = run_server(config)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Send {
            pipe,
            no_reply,
            stdin,
            cooldown_ms,
            commands,
        } => {
            init_logging(false);
            let path = socket_path(pipe);
            runtime()?.block_on(run_send(
                path,
                commands,
                no_reply,
                stdin,
                Duration::from_millis(cooldown_ms),
            ))?;
        }
        Commands::Status { pipe } => {
            init_logging(false);
            let path = socket_path(pipe);
            if runtime()?.block_on(probe(&path)) {
                println!("motionctl server is listening on {}", path.display());
            } else {
                println!("No motionctl server on {}", path.display());
                std::process::exit(1);
            }
        }
        Commands::Config(args) => {
            let config = args.into_config();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
