//! Security utilities.
//!
//! - Credential scrubbing to keep API keys and redeem tokens out of logs

pub mod credential_scrubber;

pub use credential_scrubber::{safe_error_message, scrub_credentials};
