//! Per-line edge watch
//!
//! One task per line: wait for an edge, run the handler to completion, wait
//! again. A wait error closes every line in the registry and ends the task
//! with that error; closing the line ends the task cleanly. Either way the
//! handle is dropped before the task returns.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, trace};

use super::{Line, LineRegistry};
use crate::error::Result;

/// Callback invoked for every edge: `(asserted, physical_name)`
///
/// Returning an error is treated like a failed wait.
pub type EdgeHandler = Box<dyn FnMut(bool, &str) -> Result<()> + Send>;

/// Start watching `line` on `tasks`
pub fn spawn_watch(
    tasks: &mut JoinSet<Result<()>>,
    registry: Arc<LineRegistry>,
    line: Line,
    handler: EdgeHandler,
) {
    tasks.spawn(watch_line(registry, line, handler));
}

async fn watch_line(
    registry: Arc<LineRegistry>,
    line: Line,
    mut handler: EdgeHandler,
) -> Result<()> {
    let Line {
        config,
        mut source,
        lease,
        cancel,
        watch_active,
    } = line;

    watch_active.store(true, Ordering::Relaxed);
    debug!("Watching {} ({})", config.logical_name, config.physical_name);

    let result = loop {
        let edge = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            edge = source.next_edge() => edge,
        };

        let outcome = edge.and_then(|edge| {
            let asserted = config.edge_policy.is_asserted(edge);
            trace!(
                "{}: {:?} edge (asserted={})",
                config.logical_name,
                edge,
                asserted
            );
            handler(asserted, &config.physical_name)
        });

        if let Err(e) = outcome {
            error!("{} watch failed: {}", config.logical_name, e);
            registry.close_all();
            break Err(e);
        }
    };

    // handle first, then the registry entry
    drop(source);
    drop(lease);

    watch_active.store(false, Ordering::Relaxed);
    debug!("Stopped watching {}", config.logical_name);
    result
}
