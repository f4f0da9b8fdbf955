//! Command-line front end for the livecast bridge.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use livecast_ipc::{
    command_channel, event_channel, SessionCommand, SessionEvent, DEFAULT_RTMP_PORT,
};
use livecast_lib::{init_logging, BridgeConfig, ConfigOverrides, LivecastBridge};

const STATUS_POLL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "livecast", version, about = "Live camera broadcast bridge")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "LIVECAST_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the HMAC-SHA256 of a message
    Sign {
        #[arg(long)]
        message: String,

        #[arg(long, env = "LIVECAST_SIGNING_KEY", hide_env_values = true)]
        key: String,
    },

    /// Print the signature of a cloud REST API request
    RequestSignature {
        /// Request path, e.g. /api/v1.3/live_streams
        #[arg(long)]
        path: String,

        #[arg(long, env = "LIVECAST_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Unix seconds; defaults to now
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Report broadcast and signing capability
    Probe,

    /// Publish to an RTMP ingest and report status until done
    Broadcast {
        #[arg(long)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_RTMP_PORT)]
        port: u16,

        #[arg(long, default_value = "live")]
        app: String,

        #[arg(long)]
        stream: String,

        /// Precomputed signature (64 hex characters)
        #[arg(long)]
        signature: Option<String>,

        /// Sign "{app}/{stream}" with this key instead
        #[arg(long, env = "LIVECAST_SIGNING_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Source user, for ingests that require authentication
        #[arg(long, requires = "password")]
        user: Option<String>,

        #[arg(long, env = "LIVECAST_SOURCE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Stop after this many seconds
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,
    },

    /// Read JSON session commands from stdin, write JSON events to stdout
    Serve,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    config.apply(&cli.overrides);
    config.validate()?;

    init_logging(config.verbose_log);

    match cli.command {
        Command::Sign { message, key } => {
            println!("{}", LivecastBridge::hmac_sha256(&message, &key)?);
        }
        Command::RequestSignature {
            path,
            api_key,
            timestamp,
        } => {
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => unix_now()?,
            };
            let signature = livecast_signing::request_signature(&path, &api_key, timestamp)?;
            println!("{timestamp} {signature}");
        }
        Command::Probe => {
            let bridge = LivecastBridge::new(config)?;
            println!("broadcast: {}", bridge.is_supported());
            println!("signing: {}", bridge.signing_supported());
        }
        Command::Broadcast {
            host,
            port,
            app,
            stream,
            signature,
            key,
            user,
            password,
            duration_secs,
        } => {
            let signature = match (signature, key) {
                (Some(signature), _) => signature,
                (None, Some(key)) => {
                    LivecastBridge::hmac_sha256(&format!("{app}/{stream}"), &key)?
                }
                (None, None) => bail!("either --signature or --key is required"),
            };
            let target = Target {
                host,
                port,
                app,
                stream,
                user: user.unwrap_or_default(),
                password: password.unwrap_or_default(),
            };
            let bridge = LivecastBridge::new(config)?;
            broadcast(&bridge, &target, &signature, duration_secs)?;
        }
        Command::Serve => {
            let bridge = LivecastBridge::new(config)?;
            serve(&bridge)?;
        }
    }

    Ok(())
}

struct Target {
    host: String,
    port: u16,
    app: String,
    stream: String,
    user: String,
    password: String,
}

fn broadcast(
    bridge: &LivecastBridge,
    target: &Target,
    signature: &str,
    duration_secs: u64,
) -> Result<()> {
    bridge.start_authenticated_broadcast(
        &target.app,
        target.port,
        &target.host,
        &target.stream,
        signature,
        &target.user,
        &target.password,
    )?;

    let deadline = Instant::now() + Duration::from_secs(duration_secs);
    while Instant::now() < deadline {
        print_transitions(bridge)?;
        if bridge.broadcast_status().state.is_idle() {
            break;
        }
        thread::sleep(STATUS_POLL);
    }

    bridge.stop_broadcast();
    print_transitions(bridge)?;
    println!("{}", bridge.get_broadcast_status());

    if let Some(failure) = bridge.last_failure() {
        bail!(failure);
    }
    Ok(())
}

fn print_transitions(bridge: &LivecastBridge) -> Result<()> {
    for event in bridge.poll_events()? {
        if let SessionEvent::StateChanged {
            previous, current, ..
        } = event
        {
            println!("{} -> {}", previous.name(), current.name());
        }
    }
    Ok(())
}

fn serve(bridge: &LivecastBridge) -> Result<()> {
    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();

    // Stdin blocks until EOF, so the reader is left detached.
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionCommand>(&line) {
                Ok(command) => {
                    if command_tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring malformed command: {}", e),
            }
        }
    });

    let printer = thread::spawn(move || -> Result<()> {
        let mut stdout = io::stdout().lock();
        for event in event_rx {
            serde_json::to_writer(&mut stdout, &event)?;
            writeln!(stdout)?;
            stdout.flush()?;
        }
        Ok(())
    });

    info!("Serving session commands on stdin");
    bridge.serve(command_rx, event_tx);

    match printer.join() {
        Ok(result) => result,
        Err(_) => bail!("event printer panicked"),
    }
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?
        .as_secs())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_broadcast_flags() {
        let cli = Cli::try_parse_from([
            "livecast",
            "--quality",
            "low360p",
            "broadcast",
            "--host",
            "wowza.example.com",
            "--stream",
            "cam1",
            "--signature",
            "00",
        ])
        .unwrap();

        assert_eq!(cli.overrides.quality, Some(livecast_ipc::StreamQuality::Low360p));
        match cli.command {
            Command::Broadcast { port, app, user, .. } => {
                assert_eq!(port, DEFAULT_RTMP_PORT);
                assert_eq!(app, "live");
                assert_eq!(user, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_broadcast_user_needs_password() {
        let base = [
            "livecast",
            "broadcast",
            "--host",
            "wowza.example.com",
            "--stream",
            "cam1",
            "--signature",
            "00",
            "--user",
            "alice",
        ];
        if std::env::var_os("LIVECAST_SOURCE_PASSWORD").is_none() {
            assert!(Cli::try_parse_from(base).is_err());
        }

        let cli = Cli::try_parse_from(base.iter().copied().chain(["--password", "secret"])).unwrap();
        match cli.command {
            Command::Broadcast { user, password, .. } => {
                assert_eq!(user.as_deref(), Some("alice"));
                assert_eq!(password.as_deref(), Some("secret"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
