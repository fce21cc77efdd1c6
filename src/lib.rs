//! Hub onboarding — the first-run wizard that builds a user's profile.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
