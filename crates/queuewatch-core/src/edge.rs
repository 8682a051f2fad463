//! Rising-edge detection and cooldown gating
//!
//! Pure functions: no I/O, no clock reads. The caller supplies `now`.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::state::WatchState;

/// Outcome of evaluating one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub should_notify: bool,
    /// State to persist for this check
    pub next: WatchState,
}

/// Whether `count` is strictly below `threshold`; equality counts as at/above
pub fn is_below(count: u64, threshold: u32) -> bool {
    count < u64::from(threshold)
}

/// Re-arm the detector when the threshold differs from the one last applied.
///
/// Forces `was_below_threshold` back to true and clears the cooldown, then
/// records the new threshold. Returns whether a reset happened.
pub fn rearm_on_threshold_change(state: &mut WatchState, threshold: u32) -> bool {
    if state.last_threshold == Some(threshold) {
        return false;
    }
    state.was_below_threshold = true;
    state.last_notified_at = None;
    state.last_threshold = Some(threshold);
    true
}

/// Whether enough time has passed since the last notification
pub fn cooldown_elapsed(
    last_notified_at: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some(last) = last_notified_at else {
        return true;
    };
    // A clock that moved backwards yields a negative delta, which fails to_std
    match now.signed_duration_since(last).to_std() {
        Ok(elapsed) => elapsed >= cooldown,
        Err(_) => false,
    }
}

/// Decide whether `count` warrants a notification and compute the next state.
///
/// Fires only on a below -> at/above transition, and only once the cooldown
/// since the previous notification has elapsed. `was_below_threshold` is
/// always updated to the new classification.
pub fn evaluate(
    count: u64,
    threshold: u32,
    cooldown: Duration,
    current: &WatchState,
    now: DateTime<Utc>,
) -> Decision {
    let mut state = current.clone();
    rearm_on_threshold_change(&mut state, threshold);

    let now_below = is_below(count, threshold);
    let crossed_up = state.was_below_threshold && !now_below;
    let cooldown_ok = cooldown_elapsed(state.last_notified_at, cooldown, now);
    let should_notify = !now_below && crossed_up && cooldown_ok;

    state.was_below_threshold = now_below;
    if should_notify {
        state.last_notified_at = Some(now);
    }
    state.last_count = count;
    state.last_threshold = Some(threshold);

    Decision {
        should_notify,
        next: state,
    }
}
