use clap::{Args, Parser, Subcommand, ValueEnum};
use recallkit_core::{DueStatus, Rating};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(name = "recallkit", version, about = "Spaced-repetition decks and reviews")]
pub struct Cli {
    /// Data directory holding the snapshot (defaults to the platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// JSON config file (store settings and scheduler overrides)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Deck operations
    #[command(subcommand)]
    Deck(DeckCmd),
    /// Card source operations
    #[command(subcommand)]
    Source(SourceCmd),
    /// Card operations
    #[command(subcommand)]
    Card(CardCmd),
    /// List due cards
    Due(DueCmd),
    /// List never-reviewed cards for some blocks
    New {
        #[arg(long = "block", required = true)]
        blocks: Vec<String>,
    },
    /// Rate one card
    Review {
        card_id: String,
        /// again|hard|good|easy or 1-4
        rating: Rating,
    },
    /// Interactive review loop over due cards
    Study(StudyCmd),
    /// Next due time per rating, without reviewing
    Preview { card_id: String },
    /// Review totals and streak
    Stats,
    /// Number of cards
    Count,
    /// Every block id referenced by a card source
    Blocks,
}

#[derive(Debug, Subcommand, Clone)]
pub enum DeckCmd {
    Add {
        name: String,
        #[arg(long)]
        desc: Option<String>,
        /// Parent deck id or name
        #[arg(long)]
        parent: Option<String>,
    },
    List,
    /// Move a deck under another, or to the top level without --to
    Parent {
        deck: String,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum SourceCmd {
    Add(SourceAdd),
    Show { source_id: String },
}

#[derive(Debug, Args, Clone)]
pub struct SourceAdd {
    /// Deck id or name (defaults to the built-in deck)
    #[arg(long)]
    pub deck: Option<String>,
    #[arg(long = "block")]
    pub blocks: Vec<String>,
    #[arg(long = "type")]
    pub source_type: Option<String>,
    /// Number of cards to create for the source
    #[arg(long, default_value_t = 1)]
    pub cards: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    New,
    DueToday,
    Lapsed,
    Future,
}

impl From<StatusArg> for DueStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::New => DueStatus::New,
            StatusArg::DueToday => DueStatus::DueToday,
            StatusArg::Lapsed => DueStatus::Lapsed,
            StatusArg::Future => DueStatus::Future,
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    List(CardList),
    Show { card_id: String },
    Rm { card_id: String },
    Suspend { card_id: String },
    Unsuspend { card_id: String },
    Priority { card_id: String, priority: f64 },
    Tag { card_id: String, tag: String },
    History { card_id: String },
}

#[derive(Debug, Args, Clone)]
pub struct CardList {
    #[arg(long = "block")]
    pub blocks: Vec<String>,
    /// Deck id or name; nested decks included
    #[arg(long)]
    pub deck: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct DueCmd {
    #[arg(long = "block")]
    pub blocks: Vec<String>,
    #[arg(long, default_value_t = 50)]
    pub max: usize,
}

#[derive(Debug, Args, Clone)]
pub struct StudyCmd {
    #[arg(long = "block")]
    pub blocks: Vec<String>,
    #[arg(long)]
    pub include_new: bool,
    #[arg(long, default_value_t = 50)]
    pub max: usize,
}
