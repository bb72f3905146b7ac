//! Turn-taking between user actions, the engine, and the renderer.
//!
//! A controller drives exactly one source. In local mode it pulls snapshots
//! from an [`EngineFacade`] after every mutation; in stream mode it only
//! renders whatever the [`StreamChannel`] delivered last. Either way every
//! visible update goes through one [`RenderProjector::project`] call with a
//! complete snapshot.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use life3d::state::UniverseInfo;

use crate::config::ViewerConfig;
use crate::engine::{AnimationHandle, EngineFacade, Frame, Readiness};
use crate::error::{Result, ViewerError};
use crate::projector::{capacity_for, InstanceSurface, Projection, RenderProjector};
use crate::snapshot::{Dimensions, Snapshot};
use crate::stream::{ConnectionState, StreamChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Initializing,
    Ready,
    Stepping,
    Animating,
    Disposed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "idle",
            ControllerState::Initializing => "initializing",
            ControllerState::Ready => "ready",
            ControllerState::Stepping => "stepping",
            ControllerState::Animating => "animating",
            ControllerState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Local,
    Stream,
}

/// What the status widgets show.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerStatus {
    pub state: ControllerState,
    pub mode: SourceMode,
    pub dimensions: Option<Dimensions>,
    pub generation: u64,
    pub population: u64,
    /// Local mode only.
    pub readiness: Option<Readiness>,
    /// Stream mode only.
    pub connection: Option<ConnectionState>,
    pub animating: bool,
    pub fps: u32,
    pub last_error: Option<String>,
}

/// Presented frames per second, recomputed about once a second.
#[derive(Debug)]
pub struct FpsMeter {
    window_start: Option<Instant>,
    frames: u32,
    fps: u32,
}

impl FpsMeter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            fps: 0,
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.duration_since(start);
        if elapsed >= Self::WINDOW {
            self.fps = (self.frames as f64 / elapsed.as_secs_f64()).round() as u32;
            self.frames = 0;
            self.window_start = Some(now);
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared with the animation callback.
#[derive(Debug)]
struct View {
    projector: RenderProjector,
    info: Option<UniverseInfo>,
    latest: Option<Snapshot>,
    last_error: Option<String>,
}

impl View {
    fn commit(&mut self, snapshot: Snapshot, info: UniverseInfo) -> Projection {
        let projection = self
            .projector
            .project(snapshot.cells(), snapshot.dimensions());
        self.info = Some(info);
        self.latest = Some(snapshot);
        self.last_error = None;
        projection
    }

    fn dimensions(&self) -> Option<Dimensions> {
        self.info.as_ref().and_then(|i| Dimensions::of_info(i).ok())
    }
}

enum Source {
    Local(EngineFacade),
    Stream(StreamChannel),
}

pub struct SyncController {
    source: Source,
    state: ControllerState,
    view: Rc<RefCell<View>>,
    animation: Option<AnimationHandle>,
    config: ViewerConfig,
    fps: FpsMeter,
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("mode", &self.mode())
            .field("state", &self.state)
            .field("animating", &self.is_animating())
            .finish()
    }
}

fn pull(engine: &EngineFacade) -> Result<(Snapshot, UniverseInfo)> {
    let snapshot = engine.query_cells()?;
    let info = engine.query_info()?;
    Ok((snapshot, info))
}

impl SyncController {
    fn with_source(source: Source, projector: RenderProjector, config: ViewerConfig) -> Self {
        let state = match source {
            Source::Local(_) => ControllerState::Idle,
            Source::Stream(_) => ControllerState::Ready,
        };
        Self {
            source,
            state,
            view: Rc::new(RefCell::new(View {
                projector,
                info: None,
                latest: None,
                last_error: None,
            })),
            animation: None,
            config,
            fps: FpsMeter::new(),
        }
    }

    /// Drives `engine`; nothing is shown until [`initialize`](Self::initialize).
    pub fn local(engine: EngineFacade, projector: RenderProjector, config: ViewerConfig) -> Self {
        Self::with_source(Source::Local(engine), projector, config)
    }

    /// Renders snapshots pushed through `channel`.
    pub fn streaming(
        channel: StreamChannel,
        projector: RenderProjector,
        config: ViewerConfig,
    ) -> Self {
        Self::with_source(Source::Stream(channel), projector, config)
    }

    pub fn mode(&self) -> SourceMode {
        match self.source {
            Source::Local(_) => SourceMode::Local,
            Source::Stream(_) => SourceMode::Stream,
        }
    }

    /// An animation that halted on its own counts as stopped.
    pub fn state(&self) -> ControllerState {
        if self.state == ControllerState::Animating && !self.is_animating() {
            ControllerState::Ready
        } else {
            self.state
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.as_ref().is_some_and(AnimationHandle::is_running)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn engine(&self) -> Option<&EngineFacade> {
        match &self.source {
            Source::Local(engine) => Some(engine),
            Source::Stream(_) => None,
        }
    }

    pub fn channel(&self) -> Option<&StreamChannel> {
        match &self.source {
            Source::Local(_) => None,
            Source::Stream(channel) => Some(channel),
        }
    }

    /// The snapshot currently projected.
    pub fn latest(&self) -> Option<Snapshot> {
        self.view.borrow().latest.clone()
    }

    pub fn with_projector<R>(&self, f: impl FnOnce(&RenderProjector) -> R) -> R {
        f(&self.view.borrow().projector)
    }

    pub fn status(&self) -> ViewerStatus {
        let view = self.view.borrow();
        let (readiness, connection) = match &self.source {
            Source::Local(engine) => (Some(engine.readiness()), None),
            Source::Stream(channel) => (None, Some(channel.state())),
        };
        ViewerStatus {
            state: self.state(),
            mode: self.mode(),
            dimensions: view.dimensions(),
            generation: view.info.map_or(0, |i| i.generation),
            population: view.info.map_or(0, |i| i.population),
            readiness,
            connection,
            animating: self.is_animating(),
            fps: self.fps.fps(),
            last_error: view.last_error.clone(),
        }
    }

    fn record_error(&self, action: &'static str, e: &ViewerError) {
        warn!(action, error = %e, "viewer action failed");
        self.view.borrow_mut().last_error = Some(e.to_string());
    }

    /// The engine behind this controller, once it is ready.
    async fn ready_engine(&self, action: &'static str) -> Result<EngineFacade> {
        if self.state == ControllerState::Disposed {
            return Err(ViewerError::InvalidState {
                action,
                state: ControllerState::Disposed,
            });
        }
        let engine = match &self.source {
            Source::Local(engine) => engine.clone(),
            Source::Stream(_) => return Err(ViewerError::PushOnly(action)),
        };
        engine.ready().await?;
        Ok(engine)
    }

    /// Drops a handle whose loop already ended.
    fn reap_animation(&mut self) {
        if self.animation.as_ref().is_some_and(|h| !h.is_running()) {
            self.animation = None;
            if self.state == ControllerState::Animating {
                self.state = ControllerState::Ready;
            }
        }
    }

    fn require(&mut self, action: &'static str, allow_animating: bool) -> Result<()> {
        self.reap_animation();
        match self.state {
            ControllerState::Ready => Ok(()),
            ControllerState::Animating if allow_animating => Ok(()),
            state => Err(ViewerError::InvalidState { action, state }),
        }
    }

    /// Stops a running animation. Returns true if one was running.
    pub fn stop_animation(&mut self) -> bool {
        let Some(mut handle) = self.animation.take() else {
            return false;
        };
        let was_running = handle.is_running();
        handle.stop();
        if self.state == ControllerState::Animating {
            self.state = ControllerState::Ready;
        }
        if was_running {
            info!("animation stopped");
        }
        was_running
    }

    /// Creates a fresh universe and an instance buffer sized for it.
    pub async fn initialize(&mut self, dims: Dimensions) -> Result<UniverseInfo> {
        let engine = self.ready_engine("initialize").await?;
        self.stop_animation();

        let previous = self.state;
        self.state = ControllerState::Initializing;
        match engine.init(dims).and_then(|()| engine.query_info()) {
            Ok(info) => {
                let capacity = capacity_for(dims, self.config.max_capacity);
                let mut view = self.view.borrow_mut();
                view.projector.configure(capacity);
                view.commit(Snapshot::empty(dims), info);
                drop(view);
                self.state = ControllerState::Ready;
                info!(%dims, capacity, "universe ready");
                Ok(info)
            }
            Err(e) => {
                self.state = previous;
                self.record_error("initialize", &e);
                Err(e)
            }
        }
    }

    /// Re-initializes as an `n`-cube.
    pub async fn resize(&mut self, n: u32) -> Result<UniverseInfo> {
        self.initialize(Dimensions::cube(n)?).await
    }

    /// Mutates through `f`, then refreshes the projection. Nothing is
    /// projected unless every call succeeds.
    async fn apply(
        &mut self,
        action: &'static str,
        transient: ControllerState,
        allow_animating: bool,
        f: impl FnOnce(&EngineFacade) -> Result<()>,
    ) -> Result<UniverseInfo> {
        let engine = self.ready_engine(action).await?;
        self.require(action, allow_animating)?;

        let resume = self.state;
        self.state = transient;
        let outcome = f(&engine).and_then(|()| pull(&engine));
        self.state = resume;

        match outcome {
            Ok((snapshot, info)) => {
                let projection = self.view.borrow_mut().commit(snapshot, info);
                debug!(
                    action,
                    generation = info.generation,
                    visible = projection.visible,
                    "projection refreshed"
                );
                Ok(info)
            }
            Err(e) => {
                self.record_error(action, &e);
                Err(e)
            }
        }
    }

    /// Advances one generation. Rejected while animating.
    pub async fn step(&mut self) -> Result<UniverseInfo> {
        self.apply("step", ControllerState::Stepping, false, |engine| {
            engine.step().map(|_| ())
        })
        .await
    }

    pub async fn load_pattern(&mut self, name: &str, x: i32, y: i32, z: i32) -> Result<UniverseInfo> {
        self.apply("load pattern", ControllerState::Ready, true, |engine| {
            engine.load_pattern(name, x, y, z)
        })
        .await
    }

    /// Loads `name` near the middle of the universe (offset `size / 2 - 2`).
    pub async fn load_pattern_centered(&mut self, name: &str) -> Result<UniverseInfo> {
        let dims = self.view.borrow().dimensions().ok_or(ViewerError::InvalidState {
            action: "load pattern",
            state: self.state,
        })?;
        let offset = |extent: u32| extent as i32 / 2 - 2;
        self.load_pattern(
            name,
            offset(dims.width),
            offset(dims.height),
            offset(dims.depth),
        )
        .await
    }

    pub async fn set_cell(&mut self, x: i32, y: i32, z: i32, alive: bool) -> Result<UniverseInfo> {
        self.apply("set cell", ControllerState::Ready, true, |engine| {
            engine.set_cell(x, y, z, alive)
        })
        .await
    }

    /// Stops any animation and empties the universe.
    pub async fn clear(&mut self) -> Result<UniverseInfo> {
        self.stop_animation();
        self.apply("clear", ControllerState::Ready, false, |engine| engine.clear())
            .await
    }

    /// Starts or stops continuous stepping. Returns whether it is now running.
    pub async fn toggle_animation(&mut self) -> Result<bool> {
        let engine = self.ready_engine("animate").await?;
        if self.stop_animation() {
            return Ok(false);
        }
        self.require("animate", false)?;

        let view = Rc::clone(&self.view);
        let handle = engine.start_animation(
            move |frame: Result<Frame>| {
                let mut view = view.borrow_mut();
                match frame {
                    Ok(Frame { snapshot, .. }) => {
                        let info = snapshot.info();
                        view.commit(snapshot, info);
                    }
                    Err(e) => view.last_error = Some(e.to_string()),
                }
            },
            self.config.fps,
        )?;
        self.animation = Some(handle);
        self.state = ControllerState::Animating;
        info!(fps = self.config.fps, "animation started");
        Ok(true)
    }

    /// Projects the newest pushed snapshot, if one arrived since the last
    /// tick. Does nothing in local mode.
    pub fn render_tick(&mut self) -> Option<Projection> {
        if self.state == ControllerState::Disposed {
            return None;
        }
        let Source::Stream(channel) = &self.source else {
            return None;
        };
        let snapshot = channel.latest().take()?;
        let dims = snapshot.dimensions();

        let mut view = self.view.borrow_mut();
        if view.dimensions() != Some(dims) {
            info!(%dims, "stream dimensions changed");
            view.projector.configure(self.config.stream_capacity);
        }
        let info = snapshot.info();
        Some(view.commit(snapshot, info))
    }

    /// Uploads the instance buffer if it changed. Call once per display
    /// refresh.
    pub fn present(&mut self, surface: &mut impl InstanceSurface) -> bool {
        let uploaded = self.view.borrow_mut().projector.present(surface);
        self.fps.tick(Instant::now());
        uploaded
    }

    /// Stops everything. Every later action fails with `InvalidState`.
    pub fn dispose(&mut self) {
        if self.state == ControllerState::Disposed {
            return;
        }
        self.stop_animation();
        if let Source::Stream(channel) = &mut self.source {
            channel.teardown();
        }
        self.state = ControllerState::Disposed;
        info!("viewer disposed");
    }
}
