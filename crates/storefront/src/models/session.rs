//! Session-related types.
//!
//! Types stored in the session between cart requests.

use serde::{Deserialize, Serialize};

use cartflow_core::Message;

/// Messages carried across a redirect to the next cart page view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessages {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl FlashMessages {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Append everything from `other`, keeping order.
    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Session keys for cart data.
pub mod keys {
    /// Key for the session's cart key.
    pub const CART_KEY: &str = "cart_key";

    /// Key for the per-session CSRF token.
    pub const CSRF_TOKEN: &str = "csrf_token";

    /// Key for messages waiting to be shown on the next view.
    pub const FLASH_MESSAGES: &str = "flash_messages";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_extend_keeps_order() {
        let mut flash = FlashMessages {
            errors: vec![Message::new("first")],
            warnings: Vec::new(),
        };
        assert!(!flash.is_empty());

        flash.extend(FlashMessages {
            errors: vec![Message::new("second")],
            warnings: vec![Message::new("low stock")],
        });
        assert_eq!(flash.errors, vec![Message::new("first"), Message::new("second")]);
        assert_eq!(flash.warnings.len(), 1);
    }
}
