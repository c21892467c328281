//! Application layer: the lifecycle rules that move money between wallets,
//! escrow and the platform, and the `ChallengeEngine` that loads, authorizes
//! and commits each command.

pub mod engine;
pub mod lifecycle;
