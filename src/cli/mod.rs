use crate::core::{
    config::ConfigService,
    controller::{ControllerEvent, ControllerHandle, FetchController, FetchOutcome, MessageKind},
    fetch_progress::FetchId,
    models::{DataPath, Person},
    reader::RosterReader,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

#[derive(Parser)]
#[command(name = "peoplefetch")]
#[command(
    about = "Fetch a roster of people with live progress and cancellation.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets a custom data path
    #[arg(long, value_name = "DIR")]
    pub data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the roster, printing progress as it arrives (Ctrl-C cancels)
    Fetch {
        /// How the fetch is driven
        #[arg(long, value_enum, default_value_t = StyleArg::Direct)]
        style: StyleArg,
        /// Cancel once progress reaches this percentage
        #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(1..=100))]
        cancel_after: Option<u8>,
        /// Override the configured delay per record
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,
        /// Print the roster as JSON on stdout (progress goes to stderr)
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// The key to get
        key: String,
    },
    /// Set a configuration value
    Set {
        /// The key to set
        key: String,
        /// The value to set
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleArg {
    /// Start the fetch and pump completions until idle
    Callback,
    /// Await the fetch directly
    Direct,
    /// Start a callback-style fetch, then a direct one on top of it
    Both,
}

pub struct FetchOptions {
    pub style: StyleArg,
    pub cancel_after: Option<u8>,
    pub delay_ms: Option<u64>,
    pub json: bool,
}

pub async fn handle_fetch_command(data_path: &DataPath, options: FetchOptions) -> io::Result<()> {
    let mut config = ConfigService::load_config(data_path)?;
    if let Some(delay_ms) = options.delay_ms {
        config.reader.record_delay_ms = delay_ms;
    }

    let reader = RosterReader::from_config(&config.reader, data_path);
    info!("Fetching roster from {:?}", reader.source());
    let mut controller = FetchController::new(Arc::new(reader), config.controller.event_capacity);

    let printer = spawn_printer(controller.subscribe(), options.json);
    let ctrl_c = spawn_ctrl_c_watcher(controller.handle());
    let threshold = options.cancel_after.map(|percent| {
        spawn_threshold_canceller(controller.subscribe(), controller.handle(), percent)
    });

    let mut outcomes = Vec::new();
    match options.style {
        StyleArg::Direct => outcomes.push(controller.fetch_using_direct_style().await),
        StyleArg::Callback => {
            controller.fetch_using_callback_style();
            outcomes.extend(completed_outcomes(controller.run_until_idle().await));
        }
        StyleArg::Both => {
            controller.fetch_using_callback_style();
            outcomes.push(controller.fetch_using_direct_style().await);
            outcomes.extend(completed_outcomes(controller.run_until_idle().await));
        }
    }

    let people = controller.people().to_vec();
    ctrl_c.abort();
    if let Some(threshold) = threshold {
        threshold.abort();
    }
    // Dropping the controller closes the event stream, which lets the printer finish
    drop(controller);
    if let Err(e) = printer.await {
        warn!("Progress printer stopped abnormally: {e}");
    }

    if options.json {
        let json = serde_json::to_string_pretty(&people).map_err(io::Error::other)?;
        println!("{json}");
    } else {
        print_roster(&people);
    }

    let faults: usize = outcomes
        .iter()
        .map(|outcome| match outcome {
            FetchOutcome::Faulted { causes } => *causes,
            _ => 0,
        })
        .sum();
    if faults > 0 {
        error!("Fetch finished with {faults} error(s)");
        return Err(io::Error::other(format!(
            "fetch failed with {faults} error(s)"
        )));
    }

    Ok(())
}

fn completed_outcomes(
    completed: Vec<(FetchId, FetchOutcome)>,
) -> impl Iterator<Item = FetchOutcome> {
    completed.into_iter().map(|(_, outcome)| outcome)
}

fn print_roster(people: &[Person]) {
    if people.is_empty() {
        println!("No people fetched.");
        return;
    }

    println!("Fetched {} people:", people.len());
    println!("{}", "=".repeat(20));
    for person in people {
        println!(
            "• {:>3} {} (since {}, rating {})",
            person.id,
            person,
            person.start_date.format("%Y-%m-%d"),
            person.rating
        );
    }
}

fn format_event(event: &ControllerEvent) -> Option<String> {
    match event {
        ControllerEvent::ProgressChanged(percent) => Some(format!("Progress: {percent}%")),
        ControllerEvent::UserMessage(message) => Some(match message.kind {
            MessageKind::Error => format!(
                "{} [{}] {}",
                message.kind.label(),
                message.title,
                message.message
            ),
            MessageKind::Canceled => format!("{}: {}", message.kind.label(), message.message),
        }),
        ControllerEvent::BusyChanged { style, busy } => {
            log::debug!("{style} fetch busy: {busy}");
            None
        }
        ControllerEvent::PeopleChanged(people) => {
            log::debug!("Roster now holds {} people", people.len());
            None
        }
    }
}

fn spawn_printer(
    mut events: broadcast::Receiver<ControllerEvent>,
    to_stderr: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = format_event(&event) {
                        if to_stderr {
                            eprintln!("{line}");
                        } else {
                            println!("{line}");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress display fell behind, skipped {skipped} event(s)");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_ctrl_c_watcher(handle: ControllerHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, canceling fetch");
            handle.cancel();
        }
    })
}

fn spawn_threshold_canceller(
    mut events: broadcast::Receiver<ControllerEvent>,
    handle: ControllerHandle,
    threshold: u8,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::ProgressChanged(percent)) if percent >= threshold => {
                    info!("Progress reached {percent}%, canceling");
                    handle.cancel();
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub fn handle_config_command(
    data_path: &DataPath,
    command: &Option<ConfigCommands>,
) -> io::Result<()> {
    match command {
        Some(ConfigCommands::Get { key }) => {
            let config = ConfigService::load_config(data_path)?;
            match ConfigService::get_value(&config, key) {
                Some(value) => {
                    println!("{key}: {value}");
                    println!("Config file: {}", data_path.config_path().display());
                }
                None => {
                    println!("Unknown key: {key}");
                    println!("Known keys: {}", ConfigService::known_keys().join(", "));
                }
            }
        }
        Some(ConfigCommands::Set { key, value }) => {
            let mut config = ConfigService::load_config(data_path)?;
            if let Err(e) = ConfigService::set_value(&mut config, key, value) {
                error!("Invalid configuration value: {e}");
                return Err(e);
            }
            ConfigService::save_config(&config, data_path)?;
            info!("Updated {key} configuration");
            let shown = ConfigService::get_value(&config, key).unwrap_or_default();
            println!("{key} set to: {shown}");
            println!("Config file: {}", data_path.config_path().display());
        }
        None => {
            let config = ConfigService::load_config(data_path)?;
            println!("Current Configuration:");
            println!("======================");
            for key in ConfigService::known_keys() {
                let value = ConfigService::get_value(&config, key).unwrap_or_default();
                println!("{key}: {value}");
            }
            println!();
            println!("Config file: {}", data_path.config_path().display());
        }
    }
    Ok(())
}
