mod ids;
mod progress;
mod user;

pub use ids::{UserId, UserIdError};
pub use progress::{
    CONVERSATION_COURSE, CourseProgress, PendingProgressEntry, ProgressRecord, StepProgress,
};
pub use user::{UserProfile, UserProfileError};
