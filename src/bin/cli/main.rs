mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "srs-cli", about = "Review flashcards and reading cards from the command line", version)]
struct Cli {
    /// Block store file (default: <data_local_dir>/nous/srs-store.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file (default: <config_dir>/nous/srs.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum FilterArg {
    All,
    Overdue,
    Today,
    Future,
    New,
}

/// Selects one state namespace on a block
#[derive(clap::Args, Debug, Default)]
pub struct CardSelector {
    /// Cloze blank number
    #[arg(long, conflicts_with = "direction")]
    cloze: Option<u32>,
    /// Direction card side (forward|backward)
    #[arg(long)]
    direction: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Show today's review queue
    Queue {
        /// Maximum cards shown
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Per-deck card counts
    Decks,

    /// Browse cards by due bucket
    Cards {
        #[arg(long, default_value = "all")]
        filter: FilterArg,
        /// Only cards in this deck
        #[arg(long)]
        deck: Option<String>,
    },

    /// Grade a card (again|hard|good|easy or 1-4)
    Grade {
        id: i64,
        grade: String,
        #[command(flatten)]
        card: CardSelector,
    },

    /// Show the interval each grade would give
    Preview {
        id: i64,
        #[command(flatten)]
        card: CardSelector,
    },

    /// Postpone a card to tomorrow without grading
    Bury {
        id: i64,
        #[command(flatten)]
        card: CardSelector,
    },

    /// Hide all cards of a block
    Suspend { id: i64 },

    /// Bring a suspended block back
    Unsuspend { id: i64 },

    /// Forget all review history of a block
    Reset { id: i64 },

    /// Incremental reading
    #[command(subcommand)]
    Ir(IrCommand),
}

#[derive(Subcommand)]
enum IrCommand {
    /// Show the reading queue
    Queue,

    /// Reading card counts
    Stats,

    /// Set the priority of one or more reading cards
    Priority {
        /// Priority, 1 (low) to 10 (high)
        priority: String,
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Mark a reading card as read and schedule the next reading
    Read { id: i64 },

    /// Show the topic path above a block
    Path { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.store.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Command::Queue { limit } => {
            commands::queue::run(&app, limit, &cli.format, use_color).await?;
        }
        Command::Decks => {
            commands::decks::run(&app, &cli.format, use_color).await?;
        }
        Command::Cards { filter, deck } => {
            commands::decks::run_cards(&app, filter, deck.as_deref(), &cli.format, use_color).await?;
        }
        Command::Grade { id, grade, card } => {
            commands::grade::run(&app, id, &grade, &card, &cli.format, use_color).await?;
        }
        Command::Preview { id, card } => {
            commands::grade::run_preview(&app, id, &card, &cli.format).await?;
        }
        Command::Bury { id, card } => {
            commands::grade::run_bury(&app, id, &card, &cli.format).await?;
        }
        Command::Suspend { id } => {
            commands::grade::run_suspend(&app, id, true, &cli.format).await?;
        }
        Command::Unsuspend { id } => {
            commands::grade::run_suspend(&app, id, false, &cli.format).await?;
        }
        Command::Reset { id } => {
            commands::grade::run_reset(&app, id, &cli.format).await?;
        }
        Command::Ir(subcmd) => match subcmd {
            IrCommand::Queue => {
                commands::reading::run_queue(&app, &cli.format, use_color).await?;
            }
            IrCommand::Stats => {
                commands::reading::run_stats(&app, &cli.format).await?;
            }
            IrCommand::Priority { priority, ids } => {
                commands::reading::run_priority(&app, &priority, &ids, &cli.format).await?;
            }
            IrCommand::Read { id } => {
                commands::reading::run_read(&app, id, &cli.format).await?;
            }
            IrCommand::Path { id } => {
                commands::reading::run_path(&app, id, &cli.format).await?;
            }
        },
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
