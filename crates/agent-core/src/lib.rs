//! Core abstractions for the research assistant
//!
//! This crate defines the per-request run state threaded through the
//! research graph: the [`Action`] records that make up its history, the
//! [`RunState`] accumulator, and the [`Node`] trait every graph step
//! implements.

pub mod action;
pub mod error;
pub mod node;
pub mod state;

pub use action::{
    Action, ActionKind, Chart, ChartKind, MetadataFilters, Mode, ToolInput, ToolKind, WebLink,
};
pub use error::{Error, Result};
pub use node::Node;
pub use state::RunState;
