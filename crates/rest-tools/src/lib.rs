//! Boundary layer between MCP tool handlers and an inconsistent REST API.
//!
//! The flow for one tool call is:
//! `Transport` -> [`normalize`] -> [`pagination`] (collections only) -> [`format`].
//! Failed calls go through [`errors`] instead and come back as a single descriptive line.
//!
//! Everything except [`transport`] is a pure, synchronous transformation with no shared
//! mutable state, so one [`handler::ToolContext`] can serve concurrent tool calls.

pub mod config;
pub mod errors;
pub mod format;
pub mod handler;
pub mod normalize;
pub mod pagination;
pub mod safety;
pub mod transport;
