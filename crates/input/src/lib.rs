//! Logical input: what the rider wants, never which key produced it.
//!
//! # Invariants
//! - Keyboard, mouse, touch and scripted drivers all reduce to the same intents.
//! - Commands are plain data; the session decides whether a transition is legal.

pub mod action;

pub use action::{Command, ControlIntent};
