mod commands;
mod console;

use std::env;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use timeweave_bus::{EventBus, LocalBus};
use timeweave_engine::{FirstLegalSelector, MoveSelector};
use timeweave_ops::{init_tracing, SessionStore};
use timeweave_orchestrator::{BusObserver, MoveOutcome, Session, TimelineRegistry};
use timeweave_types::{
    board::Color,
    config::TimeweaveConfig,
    events::{LifecyclePhase, SystemEvent},
    game::Verdict,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::commands::{ConsoleCommand, HELP};

#[derive(Debug, Parser)]
#[command(name = "timeweave", version, about = "Multi-timeline chess")]
struct Cli {
    /// TOML config file. Defaults to $TIMEWEAVE_CONFIG, then configs/dev.toml.
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play interactively, one command per line on stdin.
    Play,
    /// Let the CPU play the root timeline against itself.
    Auto {
        /// Overrides cpu.max_plies.
        #[arg(long)]
        plies: Option<u32>,
    },
    /// Print a saved session.
    Inspect { name: String },
}

type LiveSession = Session<BusObserver<LocalBus>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone());
    init_tracing(&config.ops)?;
    let store = SessionStore::open(&config.ops.save_dir)?;

    let bus = LocalBus::new(config.bus.capacity);
    let printer = spawn_event_printer(&bus);
    bus.publish(SystemEvent::lifecycle(
        LifecyclePhase::Boot,
        Some(format!("saves in {}", store.dir().display())),
    ))?;

    let outcome = match cli.command {
        Command::Play => play(&config, &bus, &store).await,
        Command::Auto { plies } => {
            auto_play(&config, &bus, plies.unwrap_or(config.cpu.max_plies)).await
        }
        Command::Inspect { name } => inspect(&store, &name),
    };

    bus.publish(SystemEvent::lifecycle(LifecyclePhase::Shutdown, None))?;
    drop(bus);
    if let Err(err) = printer.await {
        warn!("Event printer stopped abnormally: {err}");
    }
    outcome
}

fn spawn_event_printer(bus: &LocalBus) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            println!("{}", console::format_event(&event));
        }
    })
}

fn start_session(config: &TimeweaveConfig, bus: &LocalBus) -> Result<LiveSession> {
    let session = Session::new(config.session.clone(), BusObserver::new(bus.clone()))?;
    bus.publish(SystemEvent::lifecycle(
        LifecyclePhase::SessionStart,
        Some(config.session.initial_fen.clone()),
    ))?;
    Ok(session)
}

fn announce_verdict(bus: &LocalBus, verdict: Verdict) -> Result<bool> {
    if verdict == Verdict::Continue {
        return Ok(false);
    }
    bus.publish(SystemEvent::verdict(verdict))?;
    println!("Game over: {}", console::describe_verdict(verdict));
    Ok(true)
}

async fn play(config: &TimeweaveConfig, bus: &LocalBus, store: &SessionStore) -> Result<()> {
    let mut session = start_session(config, bus)?;
    println!("{}", console::render_multiverse(session.registry()));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Show(None) => {
                println!("{}", console::render_multiverse(session.registry()));
                for color in [Color::White, Color::Black] {
                    let ids = session.playable_timelines(color);
                    println!("{}", console::describe_playable(color, &ids));
                }
            }
            ConsoleCommand::Show(Some(id)) => match session.timeline(id) {
                Ok(timeline) => println!("{}", console::render_timeline(timeline)),
                Err(err) => println!("{err}"),
            },
            ConsoleCommand::Moves(id) => match session.legal_moves(id) {
                Ok(moves) => println!("{}", console::list_moves(&moves)),
                Err(err) => println!("{err}"),
            },
            ConsoleCommand::Move(request) => match session.request_move(request) {
                Ok(MoveOutcome::Applied(applied)) => {
                    println!("{}", console::describe_applied(&applied));
                    announce_verdict(bus, applied.verdict)?;
                }
                Ok(MoveOutcome::Rejected { reason }) => println!("Rejected: {reason}"),
                Err(err) => {
                    warn!("Move {request} failed: {err}");
                    println!("Move failed and was rolled back: {err}");
                }
            },
            ConsoleCommand::Save(name) => match store.save(&name, &session.save()) {
                Ok(path) => println!("Saved to {}", path.display()),
                Err(err) => println!("{err}"),
            },
            ConsoleCommand::Load(name) => {
                match store.load(&name).and_then(|saved| session.load(&saved)) {
                    Ok(()) => {
                        bus.publish(SystemEvent::lifecycle(
                            LifecyclePhase::SessionLoaded,
                            Some(name),
                        ))?;
                        println!("{}", console::render_multiverse(session.registry()));
                    }
                    Err(err) => println!("{err}"),
                }
            }
        }
    }

    bus.publish(SystemEvent::lifecycle(LifecyclePhase::SessionEnd, None))?;
    Ok(())
}

async fn auto_play(config: &TimeweaveConfig, bus: &LocalBus, plies: u32) -> Result<()> {
    let mut session = start_session(config, bus)?;
    let mut selector = FirstLegalSelector::new();
    selector.warm_up().await?;
    let root = session
        .registry()
        .ids()
        .next()
        .ok_or_else(|| anyhow!("session has no timelines"))?;

    for ply in 0..plies {
        match session.play_cpu_turn(&selector, root).await? {
            Some(MoveOutcome::Applied(applied)) => {
                info!("CPU ply {ply}: {}", console::describe_applied(&applied));
                if announce_verdict(bus, applied.verdict)? {
                    break;
                }
            }
            Some(MoveOutcome::Rejected { reason }) => {
                warn!("CPU move rejected: {reason}");
                break;
            }
            None => {
                info!("No move to play after {ply} plies");
                break;
            }
        }
    }

    println!("{}", console::render_timeline(session.timeline(root)?));
    println!("Verdict: {}", console::describe_verdict(session.verdict()));
    bus.publish(SystemEvent::lifecycle(LifecyclePhase::SessionEnd, None))?;
    Ok(())
}

fn inspect(store: &SessionStore, name: &str) -> Result<()> {
    let saved = store.load(name)?;
    let registry = TimelineRegistry::from_saved(&saved)?;
    println!(
        "{name}: format v{}, saved {}, {} timelines",
        saved.version,
        saved.saved_at.format("%Y-%m-%d %H:%M:%S"),
        registry.len()
    );
    println!("{}", console::render_multiverse(&registry));
    println!("Verdict: {}", console::describe_verdict(registry.verdict()));
    Ok(())
}

fn load_config(from_args: Option<String>) -> TimeweaveConfig {
    let from_env = env::var("TIMEWEAVE_CONFIG").ok();
    let path = from_args
        .or(from_env)
        .unwrap_or_else(|| "configs/dev.toml".into());
    match TimeweaveConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path
                );
                TimeweaveConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path
            );
            TimeweaveConfig::default()
        }
    }
}
