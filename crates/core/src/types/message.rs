//! User-facing messages produced by cart recalculation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An immutable, user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    text: String,
}

impl Message {
    /// Create a message from its text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The message text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Outcome of validating every line of a cart against the catalog.
///
/// `errors` are unrecoverable and force the cart to be reset; `warnings`
/// leave the cart as-is. Both are in cart order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalculationResult {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl RecalculationResult {
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn has_warning(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_error(&mut self, message: Message) {
        self.errors.push(message);
    }

    pub fn add_warning(&mut self, message: Message) {
        self.warnings.push(message);
    }
}
