//! Review queue ordering

use chrono::{DateTime, Utc};

use super::models::ReviewCard;

/// Due cards emitted before each new card
pub const DUE_PER_NEW: usize = 2;

/// Emit up to two due items, then one new item, until both run out
pub fn interleave_due_new<T>(due: Vec<T>, new: Vec<T>) -> Vec<T> {
    let mut queue = Vec::with_capacity(due.len() + new.len());
    let mut due = due.into_iter();
    let mut new = new.into_iter();

    loop {
        let mut emitted = false;
        for card in due.by_ref().take(DUE_PER_NEW) {
            queue.push(card);
            emitted = true;
        }
        if let Some(card) = new.next() {
            queue.push(card);
            emitted = true;
        }
        if !emitted {
            break;
        }
    }
    queue
}

pub fn build_review_queue(cards: Vec<ReviewCard>) -> Vec<ReviewCard> {
    build_review_queue_at(cards, Utc::now())
}

/// Due (reviewed, due by `now`) and new cards in encounter order, interleaved 2:1.
/// Cards that are neither are left out.
pub fn build_review_queue_at(cards: Vec<ReviewCard>, now: DateTime<Utc>) -> Vec<ReviewCard> {
    let mut due = Vec::new();
    let mut new = Vec::new();
    for card in cards {
        if card.is_new {
            new.push(card);
        } else if card.srs.is_due(now) {
            due.push(card);
        }
    }
    interleave_due_new(due, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::algorithm::create_initial_state;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn card(id: i64, is_new: bool, due_offset_hours: i64) -> ReviewCard {
        let mut srs = create_initial_state(fixed_now() + Duration::hours(due_offset_hours));
        if !is_new {
            srs.reps = 3;
            srs.last_reviewed = Some(fixed_now() - Duration::days(3));
        }
        ReviewCard {
            id,
            front: format!("Q{}", id),
            back: format!("A{}", id),
            srs,
            is_new,
            deck: "Default".to_string(),
            cloze_number: None,
            direction: None,
        }
    }

    fn ids(queue: &[ReviewCard]) -> Vec<i64> {
        queue.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_two_due_then_one_new() {
        // A B C D due, X Y new
        let cards = vec![
            card(1, false, -1),
            card(2, false, -2),
            card(100, true, 0),
            card(3, false, -3),
            card(4, false, -4),
            card(200, true, 0),
        ];

        let queue = build_review_queue_at(cards, fixed_now());
        assert_eq!(ids(&queue), vec![1, 2, 100, 3, 4, 200]);
    }

    #[test]
    fn test_drains_remaining_new_cards() {
        let cards = vec![card(1, false, -1), card(100, true, 0), card(200, true, 0), card(300, true, 0)];
        let queue = build_review_queue_at(cards, fixed_now());
        assert_eq!(ids(&queue), vec![1, 100, 200, 300]);
    }

    #[test]
    fn test_not_yet_due_cards_left_out() {
        let cards = vec![card(1, false, 5), card(2, false, 0), card(100, true, 48)];
        let queue = build_review_queue_at(cards, fixed_now());
        assert_eq!(ids(&queue), vec![2, 100]);
    }

    #[test]
    fn test_edge_cases() {
        assert!(build_review_queue_at(Vec::new(), fixed_now()).is_empty());

        let all_new = vec![card(5, true, 0), card(6, true, 0), card(7, true, 0)];
        assert_eq!(ids(&build_review_queue_at(all_new, fixed_now())), vec![5, 6, 7]);

        let all_due = vec![card(1, false, -1), card(2, false, -1), card(3, false, -1)];
        assert_eq!(ids(&build_review_queue_at(all_due, fixed_now())), vec![1, 2, 3]);
    }

    #[test]
    fn test_never_three_new_in_a_row_while_due_remain() {
        let due: Vec<u32> = (0..7).collect();
        let new: Vec<u32> = (100..110).collect();
        let queue = interleave_due_new(due, new);

        let last_due = queue.iter().rposition(|x| *x < 100).unwrap();
        let mut run = 0;
        for item in &queue[..=last_due] {
            run = if *item >= 100 { run + 1 } else { 0 };
            assert!(run < 2);
        }
        assert_eq!(queue.len(), 17);
    }
}
