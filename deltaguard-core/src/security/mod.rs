//! Secret handling for provider credentials.
//!
//! Passwords, OAuth tokens and cloud access keys are stored in
//! [`Secret`] values, which zero their memory on drop and never print their
//! contents through `Debug` or `Display`.

mod secret;

pub use secret::Secret;
