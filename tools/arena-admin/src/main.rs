//! Administrative console for a tournament arena.

use agent_lib::ArenaLink;
use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use protocol::{Characteristic, DEFAULT_HOST, DEFAULT_PORT, Entity, Point};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// The administrative secret of the arena.
    #[arg(long, env = "ARENA_ADMIN_SECRET", hide_env_values = true)]
    secret: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks the secret against the arena without changing anything.
    Check,
    /// Opens the start gate.
    Start,
    /// Removes a character from the arena.
    Evict { reference: u32 },
    /// Places a potion that stays hidden until released.
    StagePotion(PotionArgs),
    /// Makes a staged potion visible.
    ReleasePotion { reference: u32 },
    /// Places a potion that is visible at once.
    AddPotion(PotionArgs),
    /// Lists the staged potions.
    Pending,
}

#[derive(ClapArgs, Debug)]
struct PotionArgs {
    #[arg(long, default_value = "Potion")]
    name: String,
    #[arg(long, default_value = "Admin")]
    group: String,
    #[arg(long)]
    x: i32,
    #[arg(long)]
    y: i32,
    #[arg(long, allow_hyphen_values = true)]
    life: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    force: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    initiative: Option<i32>,
}

impl PotionArgs {
    fn entity(&self) -> Entity {
        let deltas = [
            (Characteristic::Life, self.life),
            (Characteristic::Force, self.force),
            (Characteristic::Initiative, self.initiative),
        ];
        Entity::potion(
            self.name.as_str(),
            self.group.as_str(),
            deltas
                .into_iter()
                .filter_map(|(characteristic, delta)| delta.map(|delta| (characteristic, delta))),
        )
    }

    fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,agent_lib=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    let link = ArenaLink::connect(&args.host, args.port)
        .await
        .with_context(|| format!("Could not reach the arena on {}:{}", args.host, args.port))?;
    let result = execute(&link, &args.secret, &args.command).await;
    link.close().await;
    result
}

async fn execute(link: &ArenaLink, secret: &str, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Check => {
            if !link.check_secret(secret).await.context("Check failed")? {
                anyhow::bail!("The arena rejected the secret");
            }
            tracing::info!("Secret accepted.");
        }
        Command::Start => {
            link.start_game(secret).await.context("Start refused")?;
            tracing::info!("Game started.");
        }
        Command::Evict { reference } => {
            let evicted = link.evict(*reference, secret).await.context("Eviction refused")?;
            if evicted {
                tracing::info!(reference, "Character evicted.");
            } else {
                tracing::warn!(reference, "No such character.");
            }
        }
        Command::StagePotion(potion) => {
            let reference = link
                .stage_potion(potion.entity(), potion.position(), secret)
                .await
                .context("Staging refused")?;
            tracing::info!(reference, position = %potion.position(), "Potion staged.");
            println!("{reference}");
        }
        Command::ReleasePotion { reference } => {
            link.release_potion(*reference, secret)
                .await
                .context("Release refused")?;
            tracing::info!(reference, "Potion released.");
        }
        Command::AddPotion(potion) => {
            let reference = link
                .add_potion(potion.entity(), potion.position(), secret)
                .await
                .context("Potion refused")?;
            tracing::info!(reference, position = %potion.position(), "Potion added.");
            println!("{reference}");
        }
        Command::Pending => {
            for pending in link.pending_potions(secret).await.context("Listing refused")? {
                println!("{}\t{}\t{}", pending.reference, pending.position, pending.potion);
            }
        }
    }
    Ok(())
}
