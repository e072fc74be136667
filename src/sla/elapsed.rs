//! Elapsed-time arithmetic for SLA accounting.
//!
//! Everything here is a pure function of its inputs; `now` is always passed
//! in so results are deterministic under test.

use chrono::{DateTime, Utc};

/// A pause/resume interval as the calculator sees it. An open pause has
/// `resumed_at == None` and may carry an agent's return estimate.
#[derive(Debug, Clone, Copy)]
pub struct PauseInterval {
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub expected_return_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedTime {
    pub elapsed_minutes: i64,
    pub paused_minutes: i64,
    /// Elapsed minus paused; the quantity charged against the SLA limit.
    pub effective_minutes: i64,
    /// Set when `end_time < created_at`; elapsed is clamped to zero instead
    /// of aborting so dashboards stay up on bad data.
    pub clock_skew: bool,
}

/// Computes elapsed, paused and effective minutes for a ticket as of `now`.
///
/// The end of the measured window is `resolved_at` when set, otherwise `now`:
/// resolution implicitly freezes the clock on the next read. Each pause is
/// clamped to the `[created_at, end_time]` window before it is measured, and
/// an open pause never counts time past the present instant (or past the
/// agent's return estimate, when one exists and has already elapsed).
/// Overlapping records are summed independently, without deduplication.
pub fn compute(
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    pauses: &[PauseInterval],
    now: DateTime<Utc>,
) -> ElapsedTime {
    let end_time = resolved_at.unwrap_or(now);
    let clock_skew = end_time < created_at;
    let elapsed_minutes = if clock_skew {
        0
    } else {
        (end_time - created_at).num_minutes()
    };

    let mut paused_minutes = 0;
    for pause in pauses {
        let resume_point = match (pause.resumed_at, pause.expected_return_at) {
            (Some(resumed), _) => resumed,
            (None, Some(expected)) => expected.min(now),
            (None, None) => now,
        };
        let start = pause.paused_at.max(created_at);
        let end = resume_point.min(end_time);
        if end > start {
            paused_minutes += (end - start).num_minutes();
        }
    }

    ElapsedTime {
        elapsed_minutes,
        paused_minutes,
        effective_minutes: (elapsed_minutes - paused_minutes).max(0),
        clock_skew,
    }
}
