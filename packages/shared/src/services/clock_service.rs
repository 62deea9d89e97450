use chrono::{DateTime, Utc};

use crate::models::match_record::{Color, Match, MatchResult, MatchStatus, ResultOutcome};

/// Wall-clock source. Every time-dependent decision in the services reads
/// the time through this trait.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Live remaining time of the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnClock {
    pub color: Color,
    pub remaining_ms: u64,
}

fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - since).num_milliseconds().max(0) as u64
}

/// Derives the remaining time of `turn` without touching the match.
pub fn remaining_for_turn(record: &Match, turn: Color, now: DateTime<Utc>) -> TurnClock {
    let base = record.clock_ms(turn);

    let remaining_ms = match (record.status, record.active_turn_started_at) {
        (MatchStatus::Active, Some(started_at)) => {
            base.saturating_sub(elapsed_ms(started_at, now))
        }
        _ => base,
    };

    TurnClock {
        color: turn,
        remaining_ms,
    }
}

/// Finishes the match on time if `turn` has flagged and returns the loser.
///
/// When the clock is still running the elapsed time is checkpointed into the
/// stored base and `active_turn_started_at` moves to `now`, so the derived
/// value stays the same and nothing is deducted twice.
pub fn resolve_timeout(record: &mut Match, turn: Color, now: DateTime<Utc>) -> Option<Color> {
    let clock = remaining_for_turn(record, turn, now);

    if clock.remaining_ms == 0 && record.status == MatchStatus::Active {
        record.set_clock_ms(turn, 0);
        mark_timed_out(record, turn, now);
        return Some(turn);
    }

    if clock.remaining_ms != record.clock_ms(turn) {
        record.set_clock_ms(turn, clock.remaining_ms);
        record.active_turn_started_at = Some(now);
    }

    None
}

fn mark_timed_out(record: &mut Match, loser: Color, now: DateTime<Utc>) {
    let loser_name = record
        .player_by_color(loser)
        .map(|player| player.name.clone());

    let result = MatchResult {
        outcome: ResultOutcome::Timeout,
        winner_color: Some(loser.opponent()),
        reason: format!(
            "{} ran out of time.",
            loser_name.as_deref().unwrap_or(loser.as_str())
        ),
        actor: Some(loser_name.unwrap_or_else(|| loser.to_string())),
    };

    record.conclude(MatchStatus::Finished, result, now);
}

/// Charges the mover for the time spent on the move, clamped at zero.
pub fn settle_mover_clock(record: &mut Match, mover: Color, now: DateTime<Utc>) {
    let spent = record
        .active_turn_started_at
        .map(|started_at| elapsed_ms(started_at, now))
        .unwrap_or(0);
    let remaining = record.clock_ms(mover).saturating_sub(spent);
    record.set_clock_ms(mover, remaining);
}

/// Adds the increment to the mover and starts the opponent's clock. Only
/// called while the match is still active after the move.
pub fn hand_over_turn(record: &mut Match, mover: Color, now: DateTime<Utc>) {
    let credited = record
        .clock_ms(mover)
        .saturating_add(record.time_control.increment_ms);
    record.set_clock_ms(mover, credited);
    record.active_turn_started_at = Some(now);
}
