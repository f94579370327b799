use serde::{Deserialize, Serialize};

/// A durable reminder. Exactly one of three states holds at any time: it is
/// scheduled as a one-shot job with id == `self.id`, it is past-due and about
/// to fire on the next scheduler tick, or it has been removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub text: String,
    pub remind_at: String,
    pub created_at: String,
}
