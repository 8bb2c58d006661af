//! revflow: interactive AI-assisted review of a pull request.
//!
//! The [`workflow`] module holds the review state machine. Everything it talks
//! to sits behind a trait so the loop can run against the real agent CLI, git
//! and terminal, or against the scripted doubles in the unit tests.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod fix;
pub mod git;
pub mod provider;
pub mod theme;
pub mod tui;
pub mod ui;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
