//! Graph node trait

use crate::{Result, RunState};
use async_trait::async_trait;

/// One step of the research graph
///
/// A node reads the run state and appends to its history. Nodes are shared
/// read-only across concurrent requests; all per-request data lives in the
/// [`RunState`] passed in.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute the step against the given run state
    async fn run(&self, state: &mut RunState) -> Result<()>;

    /// Node name as used by the router
    fn name(&self) -> &str;
}
