//! Data models for the flashcard system

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blocks::DbId;

/// Status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardStatus {
    /// Never reviewed
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::New
    }
}

/// Recall quality reported by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    /// Rating value used by the memory model (1-4)
    pub fn rating(self) -> u8 {
        match self {
            Grade::Again => 1,
            Grade::Hard => 2,
            Grade::Good => 3,
            Grade::Easy => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "again" | "1" => Ok(Grade::Again),
            "hard" | "2" => Ok(Grade::Hard),
            "good" | "3" => Ok(Grade::Good),
            "easy" | "4" => Ok(Grade::Easy),
            other => Err(format!("unknown grade '{}'", other)),
        }
    }
}

/// Memory state of one reviewable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Days for recall probability to fall to the requested retention
    pub stability: f64,
    /// Intrinsic difficulty, nominally 1-10 (0 before the first review)
    pub difficulty: f64,
    /// Scheduled gap in days
    pub interval: f64,
    pub due: DateTime<Utc>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub reps: u32,
    pub lapses: u32,
    /// Not persisted; rebuilt from `reps` on load
    #[serde(default)]
    pub state: CardStatus,
}

impl MemoryState {
    /// Never reviewed (either signal counts)
    pub fn is_new(&self) -> bool {
        self.last_reviewed.is_none() || self.reps == 0
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }

    /// Whether every numeric field is usable by the scheduler
    pub fn is_well_formed(&self) -> bool {
        self.stability.is_finite()
            && self.stability >= 0.0
            && self.difficulty.is_finite()
            && self.interval.is_finite()
            && self.interval >= 0.0
    }
}

/// A record of a single review
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: Uuid,
    pub grade: Grade,
    /// Lifecycle state before the review
    pub state: CardStatus,
    /// Due date before the review
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: i64,
    pub scheduled_days: f64,
    pub reviewed_at: DateTime<Utc>,
}

/// Result of applying a grade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub state: MemoryState,
    pub log: ReviewLog,
}

/// Intervals each grade would produce, in days
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalPreview {
    pub again: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

/// Side of a direction card being reviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Forward, Direction::Backward];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }

    /// Days after today the side is first due
    pub fn initial_offset_days(self) -> i64 {
        match self {
            Direction::Forward => 0,
            Direction::Backward => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Which property namespace a memory state lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum StateKey {
    /// `srs.<field>`
    Plain,
    /// `srs.c<N>.<field>`
    Cloze(u32),
    /// `srs.<forward|backward>.<field>`
    Direction(Direction),
}

impl StateKey {
    /// Property prefix including the trailing dot
    pub fn prefix(&self) -> String {
        match self {
            StateKey::Plain => "srs.".to_string(),
            StateKey::Cloze(n) => format!("srs.c{}.", n),
            StateKey::Direction(d) => format!("srs.{}.", d.as_str()),
        }
    }

    pub fn property_name(&self, field: &str) -> String {
        format!("{}{}", self.prefix(), field)
    }
}

/// Card variant, decided once when a block is classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardKind {
    Basic,
    Cloze { blank_numbers: BTreeSet<u32> },
    Direction,
}

impl CardKind {
    /// State namespaces this variant owns on its block
    pub fn state_keys(&self) -> Vec<StateKey> {
        match self {
            CardKind::Basic => vec![StateKey::Plain],
            CardKind::Cloze { blank_numbers } => {
                blank_numbers.iter().map(|n| StateKey::Cloze(*n)).collect()
            }
            CardKind::Direction => Direction::BOTH.iter().map(|d| StateKey::Direction(*d)).collect(),
        }
    }
}

/// One independently schedulable unit, rebuilt on every collection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCard {
    pub id: DbId,
    pub front: String,
    pub back: String,
    pub srs: MemoryState,
    pub is_new: bool,
    pub deck: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl ReviewCard {
    pub fn state_key(&self) -> StateKey {
        match (self.cloze_number, self.direction) {
            (Some(n), _) => StateKey::Cloze(n),
            (None, Some(d)) => StateKey::Direction(d),
            (None, None) => StateKey::Plain,
        }
    }
}

/// Per-deck counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckInfo {
    pub name: String,
    pub total_count: usize,
    pub new_count: usize,
    pub overdue_count: usize,
    pub today_count: usize,
    pub future_count: usize,
}

impl DeckInfo {
    pub fn new(name: String) -> Self {
        Self {
            name,
            total_count: 0,
            new_count: 0,
            overdue_count: 0,
            today_count: 0,
            future_count: 0,
        }
    }
}

/// Statistics across all decks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub decks: Vec<DeckInfo>,
    pub total_cards: usize,
    pub total_new: usize,
    pub total_overdue: usize,
}
