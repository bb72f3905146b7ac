//! Fixed-rate stepping loop.
//!
//! Each facade keeps an epoch counter. Starting an animation bumps it and the
//! loop remembers the value it started with; stopping bumps it again. A tick
//! whose epoch is stale exits before touching the engine, so a stop is
//! honoured even if the timer already fired.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::EngineFacade;
use crate::error::{Result, ViewerError};
use crate::snapshot::Snapshot;

/// One animation tick's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub snapshot: Snapshot,
    pub generation: u64,
}

/// Stops the animation when dropped.
#[must_use = "dropping the handle stops the animation"]
#[derive(Debug)]
pub struct AnimationHandle {
    epoch: Rc<Cell<u64>>,
    token: u64,
    halted: Rc<Cell<bool>>,
    task: Option<JoinHandle<()>>,
}

impl AnimationHandle {
    /// No-op if the loop already halted.
    pub fn stop(&mut self) {
        if self.epoch.get() == self.token {
            self.epoch.set(self.token + 1);
        }
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(token = self.token, "animation stopped");
        }
        self.halted.set(true);
    }

    /// False once stopped, superseded, or halted by an engine error.
    pub fn is_running(&self) -> bool {
        !self.halted.get() && self.epoch.get() == self.token
    }
}

impl Drop for AnimationHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn tick_period(fps: u32) -> Duration {
    Duration::from_millis((1000 / fps as u64).max(1))
}

impl EngineFacade {
    /// Steps the engine `fps` times a second, handing each frame to
    /// `on_frame`. An engine error is delivered as `Err` and ends the loop.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`]. Starting a new
    /// animation supersedes any running one on this facade.
    pub fn start_animation<F>(&self, mut on_frame: F, fps: u32) -> Result<AnimationHandle>
    where
        F: FnMut(Result<Frame>) + 'static,
    {
        self.ensure_ready()?;
        if fps == 0 {
            return Err(ViewerError::InvalidArgument("fps must be positive".into()));
        }

        let token = self.animation_epoch.get() + 1;
        self.animation_epoch.set(token);
        let period = tick_period(fps);
        let halted = Rc::new(Cell::new(false));

        let engine = self.clone();
        let epoch = Rc::clone(&self.animation_epoch);
        let done = Rc::clone(&halted);
        let task = tokio::task::spawn_local(async move {
            loop {
                tokio::time::sleep(period).await;
                if epoch.get() != token {
                    break;
                }
                let frame = engine.step().and_then(|generation| {
                    engine
                        .query_cells()
                        .map(|snapshot| Frame { snapshot, generation })
                });
                match frame {
                    Ok(frame) => on_frame(Ok(frame)),
                    Err(e) => {
                        warn!(error = %e, "animation halted");
                        on_frame(Err(e));
                        break;
                    }
                }
            }
            done.set(true);
        });

        debug!(token, fps, "animation started");
        Ok(AnimationHandle {
            epoch: Rc::clone(&self.animation_epoch),
            token,
            halted,
            task: Some(task),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use life3d::Bridge;

    use super::*;
    use crate::engine::ComputeBackend;
    use crate::snapshot::Dimensions;

    /// Bridge that counts `step` calls.
    struct Counting {
        inner: Bridge,
        steps: Rc<Cell<u32>>,
    }

    impl ComputeBackend for Counting {
        fn init(&mut self, w: i64, h: i64, d: i64) -> serde_json::Value {
            self.inner.init(w, h, d)
        }
        fn load_pattern(&mut self, name: &str, x: i64, y: i64, z: i64) -> serde_json::Value {
            ComputeBackend::load_pattern(&mut self.inner, name, x, y, z)
        }
        fn step(&mut self) -> serde_json::Value {
            self.steps.set(self.steps.get() + 1);
            ComputeBackend::step(&mut self.inner)
        }
        fn living_cells(&mut self) -> serde_json::Value {
            ComputeBackend::living_cells(&mut self.inner)
        }
        fn universe_info(&mut self) -> serde_json::Value {
            ComputeBackend::universe_info(&mut self.inner)
        }
        fn clear(&mut self) -> serde_json::Value {
            self.inner.clear()
        }
        fn set_cell(&mut self, x: i64, y: i64, z: i64, alive: bool) -> serde_json::Value {
            ComputeBackend::set_cell(&mut self.inner, x, y, z, alive)
        }
    }

    fn counting_engine() -> (EngineFacade, Rc<Cell<u32>>) {
        let steps = Rc::new(Cell::new(0));
        let engine = EngineFacade::with_backend(Box::new(Counting {
            inner: Bridge::new(),
            steps: steps.clone(),
        }));
        engine.init(Dimensions::cube(6).unwrap()).unwrap();
        engine.load_pattern("block", 2, 2, 2).unwrap();
        (engine, steps)
    }

    async fn in_local<F: std::future::Future>(f: F) -> F::Output {
        tokio::task::LocalSet::new().run_until(f).await
    }

    #[tokio::test(start_paused = true)]
    async fn frames_arrive_at_the_requested_rate() {
        in_local(async {
            let (engine, _) = counting_engine();
            let frames = Rc::new(RefCell::new(Vec::new()));
            let sink = frames.clone();
            let handle = engine
                .start_animation(
                    move |frame| sink.borrow_mut().push(frame.unwrap().generation),
                    10,
                )
                .unwrap();

            tokio::time::sleep(Duration::from_millis(350)).await;
            assert_eq!(*frames.borrow(), vec![1, 2, 3]);
            assert!(handle.is_running());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_right_after_start_never_steps() {
        in_local(async {
            let (engine, steps) = counting_engine();
            let mut handle = engine.start_animation(|_| {}, 10).unwrap();
            handle.stop();
            assert!(!handle.is_running());

            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(steps.get(), 0);
            handle.stop();
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn new_animation_supersedes_old_one() {
        in_local(async {
            let (engine, steps) = counting_engine();
            let first_frames = Rc::new(Cell::new(0));
            let counter = first_frames.clone();
            let first = engine
                .start_animation(move |_| counter.set(counter.get() + 1), 10)
                .unwrap();
            let second = engine.start_animation(|_| {}, 10).unwrap();

            tokio::time::sleep(Duration::from_millis(250)).await;
            assert!(!first.is_running());
            assert!(second.is_running());
            assert_eq!(first_frames.get(), 0);
            assert_eq!(steps.get(), 2);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn engine_error_is_reported_and_halts() {
        in_local(async {
            let engine = EngineFacade::with_backend(Box::new(Bridge::new()));
            let errors = Rc::new(RefCell::new(Vec::new()));
            let sink = errors.clone();
            let handle = engine
                .start_animation(
                    move |frame| {
                        if let Err(e) = frame {
                            sink.borrow_mut().push(e);
                        }
                    },
                    20,
                )
                .unwrap();

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(
                *errors.borrow(),
                vec![ViewerError::Engine("universe not initialized".into())]
            );
            assert!(!handle.is_running());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_loop() {
        in_local(async {
            let (engine, steps) = counting_engine();
            drop(engine.start_animation(|_| {}, 10).unwrap());
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(steps.get(), 0);
        })
        .await;
    }

    #[test]
    fn refuses_before_ready_and_zero_fps() {
        let engine = EngineFacade::loading();
        assert_eq!(
            engine.start_animation(|_| {}, 10).unwrap_err(),
            ViewerError::NotReady
        );

        let engine = EngineFacade::with_backend(Box::new(Bridge::new()));
        assert!(matches!(
            engine.start_animation(|_| {}, 0),
            Err(ViewerError::InvalidArgument(_))
        ));
        assert_eq!(tick_period(10), Duration::from_millis(100));
        assert_eq!(tick_period(5000), Duration::from_millis(1));
    }
}
