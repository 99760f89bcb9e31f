//! Terminal front end for the hint client.
//!
//! Connects to a room and reads commands from stdin:
//!
//! - `solved <difficulty>` - report a solved puzzle and roll for a hint
//! - `probs <difficulty>` - show the hint weights for a difficulty
//! - `status` - print the connection state and session snapshot
//! - `reconnect` - reconnect with the cached credentials
//! - `quit` - disconnect and exit
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use hintforge::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "hint-console")]
#[command(about = "Earn multiworld hints by solving puzzles")]
#[command(version)]
struct Cli {
    /// Server host name
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 38281)]
    port: u16,

    /// Slot (player) name
    #[arg(short, long)]
    slot: String,

    /// Room password
    #[arg(long, default_value = "")]
    password: String,

    /// Optional TOML file with client settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Solved(String),
    Probabilities(String),
    Status,
    Reconnect,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("solved", Some(difficulty)) => Command::Solved(difficulty.to_owned()),
        ("probs", Some(difficulty)) => Command::Probabilities(difficulty.to_owned()),
        ("status", None) => Command::Status,
        ("reconnect", None) => Command::Reconnect,
        ("quit" | "exit", None) => Command::Quit,
        _ => return None,
    };
    Some(command)
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn describe(outcome: &RewardOutcome) -> String {
    match outcome {
        RewardOutcome::Sent(location) => format!("hint requested for location {location}"),
        RewardOutcome::Queued(location) => {
            format!("offline: hint for location {location} queued until reconnect")
        }
        RewardOutcome::Withheld(reason) => format!("no hint this time ({reason})"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.log_filter);

    let (sink, mut notices) = ChannelNoticeSink::new();
    let client = ConnectionSupervisor::builder()
        .config(config)
        .notices(sink)
        .spawn(WebSocketConnector);

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice {
                Notice::NewHint {
                    message,
                    for_local_slot: true,
                } => println!("* {message}"),
                Notice::NewHint { message, .. } => println!("  {message}"),
                Notice::NoMoreHints => println!("No more hints available."),
                Notice::HintsDisabled => println!("Hints are disabled on this server."),
            }
        }
    });

    client
        .connect(&cli.host, cli.port, &cli.slot, &cli.password)
        .await?;
    tracing::info!(host = %cli.host, port = cli.port, slot = %cli.slot, "connecting");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = parse_command(&line) else {
            println!("commands: solved <difficulty>, probs <difficulty>, status, reconnect, quit");
            continue;
        };
        match command {
            Command::Solved(difficulty) => {
                let outcome = client.puzzle_completed(&difficulty).await?;
                println!("{}", describe(&outcome));
            }
            Command::Probabilities(difficulty) => {
                println!("{difficulty}: {}", client.hint_probabilities(&difficulty).await?);
            }
            Command::Status => {
                println!("state: {}", client.state());
                println!("pending hints: {}", client.pending_count().await?);
                if let Some(snapshot) = client.snapshot().await? {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
            }
            Command::Reconnect => client.attempt_reconnect().await?,
            Command::Quit => break,
        }
    }

    client.disconnect().await?;
    client.shutdown().await?;
    Ok(())
}
