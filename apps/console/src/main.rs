use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use control_core::{ControlClient, ControlEvent, DriveStopReason, SessionState};
use pcm_link::WsRpcConnector;
use shared::error::CommandError;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod scene;
mod video;

use commands::{parse_command, ConsoleCommand};

#[derive(Parser, Debug)]
struct Args {
    /// Endpoint address (host:port or a ws/wss URL); overrides console.toml.
    #[arg(long)]
    endpoint: Option<String>,
    /// Start without connecting; use the 'connect' command later.
    #[arg(long)]
    no_connect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(endpoint) = args.endpoint {
        settings.endpoint = endpoint;
    }

    let client = ControlClient::new_with_dependencies(
        Arc::new(WsRpcConnector::new()),
        video::TimedClip::new(Duration::from_secs(settings.clip_seconds)),
        Arc::new(scene::TerminalScene),
    );

    spawn_event_log(client.subscribe_events());

    if !args.no_connect {
        if let Err(err) = client.connect(&settings.endpoint).await {
            warn!("{err}; the console stays usable, retry with 'connect'");
        }
    }

    println!("demo vehicle console; type 'help' for commands");
    run_repl(&client, &settings.endpoint).await?;

    client.stop_drive().await;
    client.disconnect().await;
    Ok(())
}

async fn run_repl(client: &Arc<ControlClient>, endpoint: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Status => print_status(client).await,
            ConsoleCommand::Connect => {
                if let Err(err) = client.connect(endpoint).await {
                    println!("{err}");
                }
            }
            ConsoleCommand::Disconnect => client.disconnect().await,
            ConsoleCommand::ToggleDrive => {
                if client.is_driving().await {
                    client.stop_drive().await;
                } else if let Err(err) = client.start_drive().await {
                    println!("failed to start driving: {err}");
                }
            }
            ConsoleCommand::Refresh => report(client.refresh_data().await),
            ConsoleCommand::Read { name } => match client.read_named(&name).await {
                Ok(value) => println!("{name} = {value}"),
                Err(err) => println!("read failed: {err}"),
            },
            ConsoleCommand::Door { side, command } => {
                report(client.set_door(side, command).await)
            }
            ConsoleCommand::Light { mode } => report(client.set_light_mode(mode).await),
            ConsoleCommand::Fan { level } => report(client.set_fan_level(level).await),
        }
    }
    Ok(())
}

fn report(outcome: Result<(), CommandError>) {
    if let Err(err) = outcome {
        println!("command failed: {err}");
    }
}

async fn print_status(client: &Arc<ControlClient>) {
    let state = match client.session_state().await {
        SessionState::Connected => "connected",
        SessionState::Connecting => "connecting",
        SessionState::Disconnected => "disconnected",
    };
    println!("endpoint: {state}");
    println!(
        "driving: {}",
        if client.is_driving().await { "yes" } else { "no" }
    );
    for (variable, value) in client.snapshot().await {
        println!("{}: {}", variable.label(), variable.describe_value(value));
    }
}

fn print_help() {
    println!("commands:");
    println!("  left|right open|close|stop   drive a door");
    println!("  light <0-3>                  pick a light strip mode");
    println!("  fan <0-2>                    pick a fan gear");
    println!("  drive                        toggle driving (clip + signal)");
    println!("  read <variable name>         query one variable from the rig");
    println!("  refresh                      ask the rig for fresh data");
    println!("  connect | disconnect         manage the endpoint session");
    println!("  status                       show the last known state");
    println!("  quit                         leave");
}

fn spawn_event_log(mut events: broadcast::Receiver<ControlEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!(
                    "[{}] {}",
                    Local::now().format("%H:%M:%S"),
                    describe_event(&event)
                ),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn describe_event(event: &ControlEvent) -> String {
    match event {
        ControlEvent::SessionConnected => "endpoint connected".to_string(),
        ControlEvent::SessionDisconnected { cause } => {
            format!("endpoint disconnected ({cause:?})")
        }
        ControlEvent::VariableChanged { variable, value } => {
            format!("{}: {}", variable.label(), variable.describe_value(*value))
        }
        ControlEvent::WriteRejected {
            variable,
            attempted,
            current,
        } => format!(
            "{} write of {attempted} rejected; still {}",
            variable.label(),
            variable.describe_value(*current)
        ),
        ControlEvent::DriveStarted { signalled: true } => "driving".to_string(),
        ControlEvent::DriveStarted { signalled: false } => {
            "driving (video only, endpoint not signalled)".to_string()
        }
        ControlEvent::DriveStopped {
            reason: DriveStopReason::VideoEnded,
        } => "drive clip ended; vehicle stopped".to_string(),
        ControlEvent::DriveStopped {
            reason: DriveStopReason::Requested,
        } => "vehicle stopped".to_string(),
    }
}
