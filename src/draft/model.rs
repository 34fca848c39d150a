//! The email draft produced by the generator.

use serde::{Deserialize, Serialize};

/// Subject and plain-text body of an email being composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

impl Draft {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Render the draft the way it is shown to the user in chat.
    pub fn preview(&self) -> String {
        format!("Subject: {}\n\n{}", self.subject, self.body)
    }
}
