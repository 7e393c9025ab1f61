//! FSRS Spaced Repetition Algorithm
//!
//! Implementation of the FSRS-5 memory model for calculating the next
//! stability, difficulty and interval of a card after a review.
//!
//! Grades:
//! - Again: no recall (counts as a lapse)
//! - Hard: recalled with serious difficulty
//! - Good: recalled after hesitation
//! - Easy: perfect recall
//!
//! Persisted state does not record the lifecycle state, so a loaded card is
//! treated as `Review` when it has any reps and `New` otherwise. A card that
//! was in `Relearning` when saved is therefore scheduled as `Review` after a
//! reload.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::models::{CardStatus, Grade, IntervalPreview, MemoryState, ReviewLog, ReviewOutcome};
use crate::config::SchedulerConfig;

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;
/// Smallest stability the model works with
const S_MIN: f64 = 0.01;

/// Short-term steps, in minutes
const AGAIN_STEP_MINUTES: i64 = 1;
const HARD_STEP_MINUTES: i64 = 5;
const GOOD_STEP_MINUTES: i64 = 10;
const RELEARN_STEP_MINUTES: i64 = 5;

/// Fresh state for a card that has never been reviewed
pub fn create_initial_state(now: DateTime<Utc>) -> MemoryState {
    MemoryState {
        stability: 0.0,
        difficulty: 0.0,
        interval: 0.0,
        due: now,
        last_reviewed: None,
        reps: 0,
        lapses: 0,
        state: CardStatus::New,
    }
}

/// Stability and difficulty a grade leads to
#[derive(Debug, Clone, Copy)]
struct Memory {
    stability: f64,
    difficulty: f64,
}

/// Where a grade sends the card
#[derive(Debug, Clone, Copy)]
struct Step {
    memory: Memory,
    scheduled_days: f64,
    due: DateTime<Utc>,
    state: CardStatus,
}

pub struct Scheduler {
    config: SchedulerConfig,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn w(&self, i: usize) -> f64 {
        self.config.weight(i)
    }

    /// Apply `grade` to `prev` (or to a fresh card) at `now`
    ///
    /// A state with non-finite or negative numbers is treated as absent.
    pub fn next_state(&self, prev: Option<&MemoryState>, grade: Grade, now: DateTime<Utc>) -> ReviewOutcome {
        let base = create_initial_state(now);
        let card = match prev {
            Some(state) if state.is_well_formed() => MemoryState {
                state: if state.reps > 0 {
                    CardStatus::Review
                } else {
                    CardStatus::New
                },
                ..state.clone()
            },
            Some(_) => {
                log::warn!("Ignoring malformed SRS state, scheduling as a new card");
                base
            }
            None => base,
        };

        let elapsed_days = card
            .last_reviewed
            .map(|last| (now - last).num_days().max(0))
            .unwrap_or(0);

        let step = match card.state {
            CardStatus::New => self.new_step(grade, now),
            CardStatus::Learning | CardStatus::Relearning => {
                self.learning_step(&card, grade, elapsed_days, now)
            }
            CardStatus::Review => self.review_step(&card, grade, elapsed_days, now),
        };

        let log = ReviewLog {
            id: Uuid::new_v4(),
            grade,
            state: card.state,
            due: card.due,
            stability: card.stability,
            difficulty: card.difficulty,
            elapsed_days,
            scheduled_days: step.scheduled_days,
            reviewed_at: now,
        };

        let state = MemoryState {
            stability: step.memory.stability,
            difficulty: step.memory.difficulty,
            interval: step.scheduled_days,
            due: step.due,
            last_reviewed: Some(now),
            reps: card.reps + 1,
            lapses: if grade == Grade::Again {
                card.lapses + 1
            } else {
                card.lapses
            },
            state: step.state,
        };

        ReviewOutcome { state, log }
    }

    /// Intervals (days) each grade would produce, without touching `prev`
    pub fn preview_intervals(&self, prev: Option<&MemoryState>, now: DateTime<Utc>) -> IntervalPreview {
        let interval = |grade| self.next_state(prev, grade, now).state.interval;
        IntervalPreview {
            again: interval(Grade::Again),
            hard: interval(Grade::Hard),
            good: interval(Grade::Good),
            easy: interval(Grade::Easy),
        }
    }

    /// Probability of recall after `elapsed_days` at `stability`
    pub fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        (1.0 + FACTOR * elapsed_days / stability.max(S_MIN)).powf(DECAY)
    }

    fn next_interval(&self, stability: f64) -> f64 {
        let raw = stability / FACTOR * (self.config.request_retention.powf(1.0 / DECAY) - 1.0);
        let raw = if raw.is_nan() { 1.0 } else { raw };
        raw.round().clamp(1.0, self.config.maximum_interval_days())
    }

    fn init_stability(&self, grade: Grade) -> f64 {
        self.w(grade.rating() as usize - 1).max(0.1)
    }

    fn raw_init_difficulty(&self, grade: Grade) -> f64 {
        self.w(4) - (self.w(5) * (grade.rating() as f64 - 1.0)).exp() + 1.0
    }

    fn init_difficulty(&self, grade: Grade) -> f64 {
        self.raw_init_difficulty(grade).clamp(1.0, 10.0)
    }

    fn next_difficulty(&self, difficulty: f64, grade: Grade) -> f64 {
        let delta = -self.w(6) * (grade.rating() as f64 - 3.0);
        let damped = difficulty + delta * (10.0 - difficulty) / 9.0;
        let reverted = self.w(7) * self.raw_init_difficulty(Grade::Easy) + (1.0 - self.w(7)) * damped;
        reverted.clamp(1.0, 10.0)
    }

    fn next_recall_stability(&self, d: f64, s: f64, r: f64, grade: Grade) -> f64 {
        let hard_penalty = if grade == Grade::Hard { self.w(15) } else { 1.0 };
        let easy_bonus = if grade == Grade::Easy { self.w(16) } else { 1.0 };
        s * (1.0
            + self.w(8).exp()
                * (11.0 - d)
                * s.powf(-self.w(9))
                * (((1.0 - r) * self.w(10)).exp() - 1.0)
                * hard_penalty
                * easy_bonus)
    }

    fn next_forget_stability(&self, d: f64, s: f64, r: f64) -> f64 {
        let long_term = self.w(11)
            * d.powf(-self.w(12))
            * ((s + 1.0).powf(self.w(13)) - 1.0)
            * ((1.0 - r) * self.w(14)).exp();
        let short_term_cap = s / (self.w(17) * self.w(18)).exp();
        long_term.min(short_term_cap)
    }

    fn short_term_stability(&self, s: f64, grade: Grade) -> f64 {
        s * (self.w(17) * (grade.rating() as f64 - 3.0 + self.w(18))).exp()
    }

    /// Stability/difficulty after `grade` for a card already in memory
    fn next_memory(&self, card: &MemoryState, grade: Grade, elapsed_days: i64) -> Memory {
        let d = card.difficulty.clamp(1.0, 10.0);
        let s = card.stability.max(S_MIN);
        let stability = if elapsed_days == 0 {
            self.short_term_stability(s, grade)
        } else {
            let r = self.retrievability(elapsed_days as f64, s);
            match grade {
                Grade::Again => self.next_forget_stability(d, s, r),
                _ => self.next_recall_stability(d, s, r, grade),
            }
        };
        Memory {
            stability: stability.max(S_MIN),
            difficulty: self.next_difficulty(d, grade),
        }
    }

    fn new_step(&self, grade: Grade, now: DateTime<Utc>) -> Step {
        let memory = Memory {
            stability: self.init_stability(grade),
            difficulty: self.init_difficulty(grade),
        };
        let short = |minutes| Step {
            memory,
            scheduled_days: 0.0,
            due: now + Duration::minutes(minutes),
            state: CardStatus::Learning,
        };
        match grade {
            Grade::Again => short(AGAIN_STEP_MINUTES),
            Grade::Hard => short(HARD_STEP_MINUTES),
            Grade::Good => short(GOOD_STEP_MINUTES),
            Grade::Easy => {
                let days = self.next_interval(memory.stability);
                days_step(memory, days, now, CardStatus::Review)
            }
        }
    }

    fn learning_step(&self, card: &MemoryState, grade: Grade, elapsed_days: i64, now: DateTime<Utc>) -> Step {
        let memory = self.next_memory(card, grade, elapsed_days);
        match grade {
            Grade::Again => Step {
                memory,
                scheduled_days: 0.0,
                due: now + Duration::minutes(HARD_STEP_MINUTES),
                state: card.state,
            },
            Grade::Hard => Step {
                memory,
                scheduled_days: 0.0,
                due: now + Duration::minutes(GOOD_STEP_MINUTES),
                state: card.state,
            },
            Grade::Good => {
                let days = self.next_interval(memory.stability);
                days_step(memory, days, now, CardStatus::Review)
            }
            Grade::Easy => {
                let good = self.next_memory(card, Grade::Good, elapsed_days);
                let good_days = self.next_interval(good.stability);
                let days = self
                    .next_interval(memory.stability)
                    .max(good_days + 1.0)
                    .min(self.config.maximum_interval_days());
                days_step(memory, days, now, CardStatus::Review)
            }
        }
    }

    fn review_step(&self, card: &MemoryState, grade: Grade, elapsed_days: i64, now: DateTime<Utc>) -> Step {
        if grade == Grade::Again {
            return Step {
                memory: self.next_memory(card, Grade::Again, elapsed_days),
                scheduled_days: 0.0,
                due: now + Duration::minutes(RELEARN_STEP_MINUTES),
                state: CardStatus::Relearning,
            };
        }

        let hard = self.next_memory(card, Grade::Hard, elapsed_days);
        let good = self.next_memory(card, Grade::Good, elapsed_days);
        let easy = self.next_memory(card, Grade::Easy, elapsed_days);

        // Monotonic below the ceiling; at the ceiling grades may tie
        let ceiling = self.config.maximum_interval_days();
        let mut hard_days = self.next_interval(hard.stability);
        let mut good_days = self.next_interval(good.stability);
        hard_days = hard_days.min(good_days);
        good_days = good_days.max(hard_days + 1.0).min(ceiling);
        let easy_days = self
            .next_interval(easy.stability)
            .max(good_days + 1.0)
            .min(ceiling);

        match grade {
            Grade::Hard => days_step(hard, hard_days, now, CardStatus::Review),
            Grade::Good => days_step(good, good_days, now, CardStatus::Review),
            _ => days_step(easy, easy_days, now, CardStatus::Review),
        }
    }
}

fn days_step(memory: Memory, days: f64, now: DateTime<Utc>, state: CardStatus) -> Step {
    Step {
        memory,
        scheduled_days: days,
        due: add_days(now, days),
        state,
    }
}

/// `now + days`, saturating at the latest representable time
fn add_days(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    Duration::try_days(days as i64)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Map UI rating (1-4: Again, Hard, Good, Easy) to a grade
pub fn ui_rating_to_grade(rating: i32) -> Grade {
    match rating {
        1 => Grade::Again,
        2 => Grade::Hard,
        3 => Grade::Good,
        4 => Grade::Easy,
        _ => Grade::Good, // Default to Good
    }
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: f64) -> String {
    let days = if days.is_finite() { days.round() as i64 } else { 0 };
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
