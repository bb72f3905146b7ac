//! Typed, readiness-gated access to a compute backend.
//!
//! Backends speak tagged JSON: any response carrying an `error` field is a
//! failure. [`EngineFacade`] turns that into [`ViewerError`] values and refuses
//! every call until the backend has been opened.

use std::cell::{Cell as StdCell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use life3d::state::UniverseInfo;

use crate::error::{Result, ViewerError};
use crate::snapshot::{CellsPayload, Dimensions, Snapshot};

mod animation;
mod local;

pub use animation::{AnimationHandle, Frame};
pub use local::local_engine;

/// The compute capability, one method per call. Every method answers with a
/// JSON value; failures carry an `error` field.
pub trait ComputeBackend {
    fn init(&mut self, width: i64, height: i64, depth: i64) -> Value;
    fn load_pattern(&mut self, name: &str, x: i64, y: i64, z: i64) -> Value;
    fn step(&mut self) -> Value;
    /// Either a JSON-encoded string or an object with a `cells` array.
    fn living_cells(&mut self) -> Value;
    fn universe_info(&mut self) -> Value;
    fn clear(&mut self) -> Value;
    fn set_cell(&mut self, x: i64, y: i64, z: i64, alive: bool) -> Value;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Loading,
    Ready,
    Failed(String),
}

type ReadyCallback = Box<dyn FnOnce()>;

struct Gate {
    readiness: Readiness,
    backend: Option<Box<dyn ComputeBackend>>,
    pending: VecDeque<ReadyCallback>,
    draining: bool,
    generation: u64,
}

/// Cheap to clone; clones share the backend and the readiness gate.
#[derive(Clone)]
pub struct EngineFacade {
    gate: Rc<RefCell<Gate>>,
    animation_epoch: Rc<StdCell<u64>>,
}

impl std::fmt::Debug for EngineFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gate = self.gate.borrow();
        f.debug_struct("EngineFacade")
            .field("readiness", &gate.readiness)
            .field("pending", &gate.pending.len())
            .field("generation", &gate.generation)
            .finish()
    }
}

fn check_tagged(op: &'static str, response: Value) -> Result<Value> {
    if let Some(err) = response.get("error") {
        let message = match err.as_str() {
            Some(s) => s.to_string(),
            None => err.to_string(),
        };
        debug!(op, error = %message, "engine rejected call");
        return Err(ViewerError::Engine(message));
    }
    Ok(response)
}

impl EngineFacade {
    /// A facade whose backend is still being produced.
    pub fn loading() -> Self {
        Self {
            gate: Rc::new(RefCell::new(Gate {
                readiness: Readiness::Loading,
                backend: None,
                pending: VecDeque::new(),
                draining: false,
                generation: 0,
            })),
            animation_epoch: Rc::new(StdCell::new(0)),
        }
    }

    /// A facade that is ready immediately.
    pub fn with_backend(backend: Box<dyn ComputeBackend>) -> Self {
        let facade = Self::loading();
        facade.open(backend);
        facade
    }

    pub fn readiness(&self) -> Readiness {
        self.gate.borrow().readiness.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.borrow().readiness == Readiness::Ready
    }

    /// Generation reported by the last successful `step`, or 0 after `init`
    /// and `clear`.
    pub fn generation(&self) -> u64 {
        self.gate.borrow().generation
    }

    /// Opens the gate and runs queued callbacks in registration order.
    /// Returns false if the gate was already open or failed.
    pub fn open(&self, backend: Box<dyn ComputeBackend>) -> bool {
        {
            let mut gate = self.gate.borrow_mut();
            if gate.readiness != Readiness::Loading {
                warn!(readiness = ?gate.readiness, "ignoring second readiness signal");
                return false;
            }
            gate.backend = Some(backend);
            gate.readiness = Readiness::Ready;
            gate.draining = true;
            info!(queued = gate.pending.len(), "compute engine ready");
        }
        self.drain();
        true
    }

    /// Marks the gate failed; queued callbacks are dropped without running.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let dropped = {
            let mut gate = self.gate.borrow_mut();
            if gate.readiness != Readiness::Loading {
                warn!(readiness = ?gate.readiness, %reason, "ignoring late readiness failure");
                return false;
            }
            gate.readiness = Readiness::Failed(reason.clone());
            std::mem::take(&mut gate.pending)
        };
        warn!(%reason, dropped = dropped.len(), "compute engine failed to load");
        // Dropped outside the borrow: callbacks may own facade clones.
        drop(dropped);
        true
    }

    /// Waits for `backend` and opens or fails the gate with its outcome.
    pub async fn load<F>(&self, backend: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<Box<dyn ComputeBackend>, String>>,
    {
        match backend.await {
            Ok(backend) => {
                self.open(backend);
                Ok(())
            }
            Err(reason) => {
                self.fail(reason.clone());
                Err(ViewerError::EngineUnavailable(reason))
            }
        }
    }

    fn drain(&self) {
        loop {
            let next = self.gate.borrow_mut().pending.pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.gate.borrow_mut().draining = false;
    }

    /// Runs `callback` once the engine is ready.
    ///
    /// If the engine is already ready (and not still flushing earlier
    /// callbacks) it runs before this returns.
    pub fn on_ready(&self, callback: impl FnOnce() + 'static) -> Result<()> {
        {
            let mut guard = self.gate.borrow_mut();
            let gate = &mut *guard;
            match &gate.readiness {
                Readiness::Failed(reason) => {
                    return Err(ViewerError::EngineUnavailable(reason.clone()));
                }
                Readiness::Ready if !gate.draining => {}
                Readiness::Ready | Readiness::Loading => {
                    gate.pending.push_back(Box::new(callback));
                    return Ok(());
                }
            }
        }
        callback();
        Ok(())
    }

    /// Resolves in registration order with other readiness waiters.
    pub async fn ready(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.on_ready(move || {
            let _ = tx.send(());
        })?;
        match rx.await {
            Ok(()) => Ok(()),
            Err(_) => Err(self.unavailable()),
        }
    }

    fn unavailable(&self) -> ViewerError {
        match self.readiness() {
            Readiness::Failed(reason) => ViewerError::EngineUnavailable(reason),
            _ => ViewerError::NotReady,
        }
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match &self.gate.borrow().readiness {
            Readiness::Ready => Ok(()),
            Readiness::Loading => Err(ViewerError::NotReady),
            Readiness::Failed(reason) => Err(ViewerError::EngineUnavailable(reason.clone())),
        }
    }

    fn call(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut dyn ComputeBackend) -> Value,
    ) -> Result<Value> {
        self.ensure_ready()?;
        let response = {
            let mut gate = self.gate.borrow_mut();
            let backend = gate.backend.as_mut().ok_or(ViewerError::NotReady)?;
            f(&mut **backend)
        };
        check_tagged(op, response)
    }

    pub fn init(&self, dims: Dimensions) -> Result<()> {
        self.call("init", |b| {
            b.init(dims.width as i64, dims.height as i64, dims.depth as i64)
        })?;
        self.gate.borrow_mut().generation = 0;
        debug!(%dims, "universe initialized");
        Ok(())
    }

    pub fn load_pattern(&self, name: &str, x: i32, y: i32, z: i32) -> Result<()> {
        self.call("load_pattern", |b| {
            b.load_pattern(name, x as i64, y as i64, z as i64)
        })?;
        Ok(())
    }

    /// Advances one generation and returns the new generation number.
    pub fn step(&self) -> Result<u64> {
        let response = self.call("step", |b| b.step())?;
        let generation = response
            .get("generation")
            .and_then(Value::as_u64)
            .ok_or_else(|| ViewerError::Engine("step response has no generation".into()))?;

        let mut gate = self.gate.borrow_mut();
        if generation < gate.generation {
            return Err(ViewerError::Engine(format!(
                "generation went backwards: {} -> {generation}",
                gate.generation
            )));
        }
        gate.generation = generation;
        Ok(generation)
    }

    pub fn set_cell(&self, x: i32, y: i32, z: i32, alive: bool) -> Result<()> {
        self.call("set_cell", |b| {
            b.set_cell(x as i64, y as i64, z as i64, alive)
        })?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.call("clear", |b| b.clear())?;
        self.gate.borrow_mut().generation = 0;
        Ok(())
    }

    pub fn query_cells(&self) -> Result<Snapshot> {
        let payload: CellsPayload = match self.call("query_cells", |b| b.living_cells())? {
            Value::String(encoded) => serde_json::from_str(&encoded)?,
            other => serde_json::from_value(other)?,
        };
        let state = match payload.into_state() {
            Ok(state) => state,
            Err(partial) => partial.complete_with(&self.query_info()?),
        };
        Snapshot::from_state(state)
    }

    pub fn query_info(&self) -> Result<UniverseInfo> {
        let response = self.call("query_info", |b| b.universe_info())?;
        Ok(serde_json::from_value(response)?)
    }

    /// Steps `n` times; stops at the first error. Returns the last generation.
    pub fn run_for(&self, n: u64) -> Result<u64> {
        self.ensure_ready()?;
        let mut generation = self.generation();
        for _ in 0..n {
            generation = self.step()?;
        }
        Ok(generation)
    }

    /// Like [`run_for`](Self::run_for), fetching a snapshot after each step and
    /// awaiting `on_each_step(snapshot, i)` (1-based) before the next one.
    pub async fn run_for_each<F, Fut>(
        &self,
        n: u64,
        pace: Option<Duration>,
        mut on_each_step: F,
    ) -> Result<u64>
    where
        F: FnMut(Snapshot, u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.ensure_ready()?;
        let mut generation = self.generation();
        for i in 1..=n {
            if i > 1 {
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
            generation = self.step()?;
            let snapshot = self.query_cells()?;
            on_each_step(snapshot, i).await;
        }
        Ok(generation)
    }
}
