//! In-memory GPIO backend for tests
//!
//! Each line has a level and an edge channel. Driving an edge updates the
//! level the same way the hardware would, then queues the event.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Edge, EdgeSource, GpioBackend, Level, LineConfig};
use crate::error::{AppError, Result};

struct SimLine {
    level: Arc<Mutex<Level>>,
    tx: Option<mpsc::UnboundedSender<Result<Edge>>>,
    // one clone per live edge source
    handles: Arc<()>,
}

pub(crate) struct SimBackend {
    lines: Mutex<HashMap<String, SimLine>>,
}

impl SimBackend {
    /// Backend exposing the given line names, all idle high
    pub fn new(names: &[&str]) -> Arc<Self> {
        let lines = names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    SimLine {
                        level: Arc::new(Mutex::new(Level::High)),
                        tx: None,
                        handles: Arc::new(()),
                    },
                )
            })
            .collect();
        Arc::new(Self {
            lines: Mutex::new(lines),
        })
    }

    pub fn set_level(&self, name: &str, level: Level) {
        if let Some(line) = self.lines.lock().get(name) {
            *line.level.lock() = level;
        }
    }

    pub fn edge(&self, name: &str, edge: Edge) {
        let lines = self.lines.lock();
        let line = lines.get(name).expect("unknown sim line");
        *line.level.lock() = match edge {
            Edge::Falling => Level::Low,
            Edge::Rising => Level::High,
        };
        if let Some(tx) = &line.tx {
            let _ = tx.send(Ok(edge));
        }
    }

    pub fn fail(&self, name: &str) {
        let lines = self.lines.lock();
        let line = lines.get(name).expect("unknown sim line");
        if let Some(tx) = &line.tx {
            let _ = tx.send(Err(AppError::hardware(name, "simulated fd error")));
        }
    }

    /// Number of edge sources for `name` that have not been dropped
    pub fn handle_count(&self, name: &str) -> usize {
        let lines = self.lines.lock();
        let line = lines.get(name).expect("unknown sim line");
        Arc::strong_count(&line.handles) - 1
    }

    /// Let spawned watch tasks drain their queues
    pub async fn settle(&self) {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }
}

impl GpioBackend for SimBackend {
    fn request(&self, config: &LineConfig) -> Result<Box<dyn EdgeSource>> {
        let mut lines = self.lines.lock();
        let line = lines.get_mut(&config.physical_name).ok_or_else(|| {
            AppError::Config(format!(
                "Failed to find the {} line for {}",
                config.physical_name, config.logical_name
            ))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        line.tx = Some(tx);

        Ok(Box::new(SimEdgeSource {
            name: config.physical_name.clone(),
            level: line.level.clone(),
            rx,
            _handle: line.handles.clone(),
        }))
    }
}

struct SimEdgeSource {
    name: String,
    level: Arc<Mutex<Level>>,
    rx: mpsc::UnboundedReceiver<Result<Edge>>,
    _handle: Arc<()>,
}

#[async_trait]
impl EdgeSource for SimEdgeSource {
    fn level(&self) -> Result<Level> {
        Ok(*self.level.lock())
    }

    async fn next_edge(&mut self) -> Result<Edge> {
        match self.rx.recv().await {
            Some(edge) => edge,
            None => Err(AppError::hardware(&self.name, "line closed")),
        }
    }
}
