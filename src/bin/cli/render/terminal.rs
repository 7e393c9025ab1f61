use chrono::{DateTime, Local, Utc};

use nous_srs::flashcards::{ReviewCard, StateKey};
use nous_srs::time::DayWindow;

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Short label for the state namespace a card reviews, e.g. `c2` or `backward`
pub fn key_label(key: StateKey) -> String {
    match key {
        StateKey::Plain => "-".to_string(),
        StateKey::Cloze(n) => format!("c{}", n),
        StateKey::Direction(d) => d.to_string(),
    }
}

/// Due date colored by bucket: red overdue, yellow today, plain later
pub fn due_label(card: &ReviewCard, window: &DayWindow, use_color: bool) -> String {
    if card.is_new {
        return paint("new", Color::BLUE, use_color);
    }
    let text = local_date(card.srs.due);
    if window.is_overdue(card.srs.due) {
        paint(&text, Color::RED, use_color)
    } else if window.is_today(card.srs.due) {
        paint(&text, Color::YELLOW, use_color)
    } else {
        text
    }
}

pub fn local_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Truncate to `max` chars, appending an ellipsis when cut
pub fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max.saturating_sub(1)).collect();
    format!("{}\u{2026}", cut)
}

pub fn rule(width: usize) -> String {
    "\u{2500}".repeat(width)
}
