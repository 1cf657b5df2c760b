use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::UserId;

/// Name of the single course the app currently ships.
pub const CONVERSATION_COURSE: &str = "Conversation";

//
// ─── STEP PROGRESS ─────────────────────────────────────────────────────────────
//

/// The pair of values stored locally, queued, and pushed remotely.
///
/// `value` is the float shown in progress charts; `last_step_index` is the
/// index of the last completed phrase. A training advance sets both to the
/// same step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepProgress {
    pub value: f32,
    pub last_step_index: u32,
}

impl StepProgress {
    #[must_use]
    pub fn new(value: f32, last_step_index: u32) -> Self {
        Self {
            value,
            last_step_index,
        }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Progress after completing the step at `index`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn at_step(index: u32) -> Self {
        Self {
            value: index as f32,
            last_step_index: index,
        }
    }

    /// True when either field still holds its default.
    ///
    /// Such entries carry nothing worth pushing and are skipped on drain.
    #[must_use]
    pub fn is_trivially_zero(&self) -> bool {
        self.value == 0.0 || self.last_step_index == 0
    }

    /// Completion percentage for the home-screen widget (ten points per step).
    #[must_use]
    pub fn percent(&self) -> u8 {
        let pct = self.last_step_index.saturating_mul(10).min(100);
        u8::try_from(pct).unwrap_or(100)
    }
}

//
// ─── CONFIRMED PROGRESS ────────────────────────────────────────────────────────
//

/// The user's locally confirmed progress. Always reflects the latest advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    user_id: UserId,
    progress: StepProgress,
}

impl ProgressRecord {
    #[must_use]
    pub fn new(user_id: UserId, progress: StepProgress) -> Self {
        Self { user_id, progress }
    }

    /// Fresh record created at signup.
    #[must_use]
    pub fn zeroed(user_id: UserId) -> Self {
        Self::new(user_id, StepProgress::zero())
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn progress(&self) -> StepProgress {
        self.progress
    }

    #[must_use]
    pub fn progress_value(&self) -> f32 {
        self.progress.value
    }

    #[must_use]
    pub fn last_step_index(&self) -> u32 {
        self.progress.last_step_index
    }

    #[must_use]
    pub fn course_progress(&self) -> CourseProgress {
        CourseProgress {
            course: CONVERSATION_COURSE.to_owned(),
            progress: self.progress.value,
            last_step_index: self.progress.last_step_index,
        }
    }
}

/// Per-course view handed to progress screens and charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub course: String,
    pub progress: f32,
    pub last_step_index: u32,
}

//
// ─── PENDING QUEUE ENTRY ───────────────────────────────────────────────────────
//

/// An advance that has not been confirmed by the remote store.
///
/// Keyed by user: queueing a newer entry replaces the older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingProgressEntry {
    user_id: UserId,
    progress: StepProgress,
    queued_at: DateTime<Utc>,
}

impl PendingProgressEntry {
    #[must_use]
    pub fn new(user_id: UserId, progress: StepProgress, queued_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            progress,
            queued_at,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn progress(&self) -> StepProgress {
        self.progress
    }

    #[must_use]
    pub fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }

    #[must_use]
    pub fn is_trivially_zero(&self) -> bool {
        self.progress.is_trivially_zero()
    }
}
