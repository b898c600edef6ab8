mod strategy;

use crate::strategy::Duelist;
use agent_lib::{AgentSettings, run_agent};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use protocol::{CharacterKind, Characteristic, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WORLD_SIZE, Entity, Point};
use rand::Rng;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fatal failure while setting up or while connected.
const EXIT_SETUP_FAILURE: u8 = 1;
/// Too many or unknown arguments.
const EXIT_BAD_ARGUMENTS: u8 = 2;
/// The port is not a number.
const EXIT_PORT_NAN: u8 = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Fighter,
    Berserker,
    TimeMage,
}

/// Sends a duelling character into the arena.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Port of the arena.
    port: Option<String>,
    /// Host of the arena.
    host: Option<String>,
    #[arg(long, value_enum, default_value_t = Kind::TimeMage)]
    kind: Kind,
    #[arg(long, default_value = "Duelist")]
    name: String,
    #[arg(long, default_value = "G10")]
    group: String,
    /// Turns before the arena disconnects us. Unlimited if absent.
    #[arg(long)]
    turns: Option<u32>,
    /// The host the arena reaches our callback endpoint on.
    #[arg(long, default_value = DEFAULT_HOST)]
    callback_host: String,
}

impl Args {
    fn entity(&self) -> Entity {
        let (kind, force) = match self.kind {
            Kind::Fighter => (CharacterKind::Fighter, Characteristic::Force.default_value()),
            Kind::Berserker => (CharacterKind::Berserker, 35),
            Kind::TimeMage => (CharacterKind::TimeMage, Characteristic::Force.default_value()),
        };
        Entity::character(
            self.name.as_str(),
            self.group.as_str(),
            kind,
            [(Characteristic::Force, force)],
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace,agent_lib=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_BAD_ARGUMENTS),
            };
        }
    };
    let port = match args.port.as_deref().map(str::parse::<u16>) {
        None => DEFAULT_PORT,
        Some(Ok(port)) => port,
        Some(Err(error)) => {
            tracing::error!(%error, "The port is not a number.");
            return ExitCode::from(EXIT_PORT_NAN);
        }
    };

    let position = {
        let mut rng = rand::thread_rng();
        Point::new(
            rng.gen_range(0..DEFAULT_WORLD_SIZE),
            rng.gen_range(0..DEFAULT_WORLD_SIZE),
        )
    };
    let mut settings = AgentSettings::new(args.entity(), position);
    settings.arena_port = port;
    settings.arena_host = args.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
    settings.callback_host = args.callback_host.clone();
    settings.turn_budget = args.turns;

    tracing::info!(name = %args.name, kind = ?args.kind, %position, "Creating the character.");
    match run_agent(settings, Duelist::default()).await {
        Ok(reason) => {
            tracing::info!(%reason, "Left the arena.");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "Agent failed.");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}
