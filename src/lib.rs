//! Reliable waits and reversible fixtures for behaviour-driven browser tests.
//!
//! `stepkit` supplies the primitives that step-definition authors compose into
//! scenarios against a live, JavaScript-driven web UI. The hard part of such
//! tests is rarely "click a button": it is keeping steps reliable against an
//! eventually-consistent UI and making every fixture a step creates reversible,
//! so that one scenario never leaks state into the next.
//!
//! # Architecture
//!
//! The browser driver, identity switching, and the content-management API are
//! external collaborators. They are described by traits in [`session`],
//! [`identity`], and [`content`], and are injected by reference when a
//! [`scenario::Scenario`] begins. Everything a scenario mutates is owned by that
//! scenario value, so two scenarios can never share a compensation stack or an
//! escalation.
//!
//! # Modules
//!
//! - [`wait`]: Condition polling delegated to the session's native wait
//! - [`undo`]: LIFO compensating actions flushed at scenario end
//! - [`identity`]: Stack-discipline privilege escalation
//! - [`blocks`]: Block placement across incompatible layout subsystems
//! - [`field_ui`]: Reversible view-mode and configuration fixtures
//! - [`scenario`]: Per-scenario lifecycle wiring and reporting
//! - [`session`]: Browser session collaborator traits and element helpers
//! - [`content`]: Content and configuration collaborator trait
//! - [`config`]: Layered harness configuration (defaults < file < env)
//! - [`error`]: Semantic error types

pub mod blocks;
pub mod config;
pub mod content;
pub mod error;
pub mod field_ui;
pub mod identity;
pub mod scenario;
pub mod session;
pub mod undo;
pub mod wait;
