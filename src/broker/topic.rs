// src/broker/topic.rs

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Every topic the service produces to or consumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Key: quiz UUID, value: socket id to notify.
    QuizExport,
    /// Key: quiz UUID, value: socket id to notify.
    QuizRevoke,
    /// Key: `"{user_uuid}|{quiz_uuid}"`, value: progress snapshot JSON.
    UserQuizExport,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::QuizExport, Topic::QuizRevoke, Topic::UserQuizExport];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::QuizExport => "quiz_export",
            Topic::QuizRevoke => "revoke_quiz",
            Topic::UserQuizExport => "user_quiz_export",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("unknown topic: {s}")))
    }
}
