use anyhow::{bail, Context, Result};
use chrono::Utc;

use nous_srs::reading::collector::{load_ir_cards, load_ir_queue};
use nous_srs::reading::storage::parse_priority;
use nous_srs::reading::{calculate_ir_stats, find_topic_path, IrCard};
use nous_srs::tasks::LoadOutcome;
use nous_srs::time::DayWindow;

use super::interrupt_token;
use crate::app::App;
use crate::render::terminal::{local_date, paint, rule, truncate, Color};
use crate::OutputFormat;

fn due_text(card: &IrCard, use_color: bool) -> String {
    if card.is_new {
        paint("new", Color::BLUE, use_color)
    } else {
        local_date(card.due)
    }
}

pub async fn run_queue(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let queue = match load_ir_queue(app.ctx.reading(), Utc::now(), &interrupt_token()).await {
        LoadOutcome::Completed(queue) => queue.context("Failed to collect reading cards")?,
        LoadOutcome::Cancelled => bail!("Interrupted"),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&queue)?);
        }
        OutputFormat::Plain => {
            if queue.is_empty() {
                println!("Nothing to read.");
                return Ok(());
            }

            println!("{:<8} {:>4} {:<9} {:<11} Title", "Id", "Pri", "Type", "Due");
            println!("{}", rule(72));
            for card in &queue {
                println!(
                    "{:<8} {:>4} {:<9} {:<11} {}",
                    card.id,
                    card.priority,
                    card.card_type,
                    due_text(card, use_color),
                    truncate(&card.title, 40),
                );
            }
            println!("\n{} reading cards", queue.len());
        }
    }

    Ok(())
}

pub async fn run_stats(app: &App, format: &OutputFormat) -> Result<()> {
    let now = Utc::now();
    let reading = app.ctx.reading();
    let blocks = app
        .ctx
        .store()
        .get_blocks_with_tag(reading.card_tag())
        .await
        .context("Failed to load tagged blocks")?;
    let cards = load_ir_cards(reading, &blocks, now).await;
    let stats = calculate_ir_stats(&cards, &DayWindow::at(now));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Plain => {
            println!("Total:        {}", stats.total);
            println!("New:          {}", stats.new_count);
            println!("Overdue:      {}", stats.overdue_count);
            println!("Today:        {}", stats.today_count);
            println!("Next 7 days:  {}", stats.upcoming7_count);
        }
    }

    Ok(())
}

pub async fn run_priority(app: &App, priority: &str, ids: &[i64], format: &OutputFormat) -> Result<()> {
    let priority = parse_priority(priority)?;
    let result = app.ctx.reading().bulk_update_priority(ids, priority).await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Plain => {
            println!("Updated {} of {} block(s)", result.success.len(), ids.len());
            for failed in &result.failed {
                println!("  {}: {}", failed.id, failed.error);
            }
        }
    }

    if !result.is_complete_success() {
        bail!("{} block(s) could not be updated", result.failed.len());
    }
    Ok(())
}

pub async fn run_read(app: &App, id: i64, format: &OutputFormat) -> Result<()> {
    let state = app
        .ctx
        .reading()
        .mark_as_read(id)
        .await
        .with_context(|| format!("Failed to mark block {} as read", id))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        OutputFormat::Plain => {
            println!(
                "Read {} ({} times), next reading {}",
                id,
                state.read_count,
                local_date(state.due)
            );
        }
    }

    Ok(())
}

/// Topic breadcrumb; Ctrl-C abandons the walk
pub async fn run_path(app: &App, id: i64, format: &OutputFormat) -> Result<()> {
    let cancel = interrupt_token();
    let config = app.ctx.config();
    let outcome = find_topic_path(
        app.ctx.store(),
        &config.card_tag,
        id,
        config.reading.breadcrumb_depth,
        &cancel,
    )
    .await;
    let path = match outcome {
        LoadOutcome::Completed(path) => path?,
        LoadOutcome::Cancelled => bail!("Interrupted"),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&path)?);
        }
        OutputFormat::Plain => {
            if path.is_empty() {
                println!("Block {} not found.", id);
                return Ok(());
            }
            let names: Vec<&str> = path.iter().map(|item| item.text.as_str()).collect();
            println!("{}", names.join(" \u{203a} "));
        }
    }

    Ok(())
}
