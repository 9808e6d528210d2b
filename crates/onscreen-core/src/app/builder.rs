//! AppBuilder - wiring ports, scheduler and worker groups together.
//!
//! `build()` fails fast: a missing port or an invalid config is reported
//! before any worker is spawned.

use std::sync::Arc;

use tracing::info;

use crate::app::scheduler::Scheduler;
use crate::config::SchedulerConfig;
use crate::domain::Stage;
use crate::error::SchedulerError;
use crate::impls::NoopStateSink;
use crate::ports::{FetchTransport, StateSink, TransformEngine};
use crate::runtime::Runtime;
use crate::worker::WorkerGroup;

/// Builds an [`App`].
///
/// # Example
/// ```ignore
/// let app = AppBuilder::new()
///     .config(config)
///     .transport(Arc::new(SimulatedTransport::default()))
///     .engine(Arc::new(SepiaTransform::default()))
///     .sink(Arc::new(sink))
///     .build()?;
/// ```
pub struct AppBuilder {
    config: SchedulerConfig,
    transport: Option<Arc<dyn FetchTransport>>,
    engine: Option<Arc<dyn TransformEngine>>,
    sink: Option<Arc<dyn StateSink>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing ports: {0:?}")]
    MissingPorts(Vec<&'static str>),
    #[error(transparent)]
    Config(#[from] SchedulerError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            transport: None,
            engine: None,
            sink: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn FetchTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn TransformEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Optional. Without a sink, state changes are dropped.
    pub fn sink(mut self, sink: Arc<dyn StateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate and spawn one worker group per stage.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<App, BuildError> {
        let mut missing = Vec::new();
        if self.transport.is_none() {
            missing.push("transport");
        }
        if self.engine.is_none() {
            missing.push("engine");
        }
        let (Some(transport), Some(engine)) = (self.transport, self.engine) else {
            return Err(BuildError::MissingPorts(missing));
        };

        let sink = self.sink.unwrap_or_else(|| Arc::new(NoopStateSink));
        let scheduler = Scheduler::new(self.config.clone(), sink)?;
        let runtime = Arc::new(Runtime::new(transport, engine));

        // One worker per slot: the queue bound is the real limit.
        let workers = Stage::ALL
            .into_iter()
            .map(|stage| {
                WorkerGroup::spawn(
                    self.config.concurrency_for(stage),
                    scheduler.queue(stage).clone(),
                    Arc::clone(&runtime),
                )
            })
            .collect();

        info!(
            fetch = self.config.fetch_concurrency,
            transform = self.config.transform_concurrency,
            "app built"
        );
        Ok(App { scheduler, workers })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Running application: the control context plus its workers.
///
/// The control loop lives in `control_loop.rs`.
pub struct App {
    pub(crate) scheduler: Scheduler,
    pub(crate) workers: Vec<WorkerGroup>,
}

impl App {
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Cancel outstanding work, close the queues and wait for every worker.
    pub async fn shutdown(mut self) {
        self.scheduler.shutdown();
        for group in self.workers.drain(..) {
            group.shutdown_and_join().await;
        }
        info!("app stopped");
    }
}
