//! Domain models for the storefront HTTP layer.

pub mod session;

pub use session::{FlashMessages, keys as session_keys};
