//! Outer adapters that feed commands into the engine and report results.

pub mod csv;
