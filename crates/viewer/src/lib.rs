//! # life3d_viewer
//!
//! Keeps a fixed-size GPU instance buffer in step with a 3D cellular
//! automaton whose state lives somewhere else: an in-process compute engine
//! that is stepped on demand, or a server that pushes snapshots over a
//! WebSocket.
//!
//! ## Quick Start
//!
//! ```
//! use life3d_viewer::prelude::*;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let engine = local_engine(Rule::B6_S567);
//! let mut viewer = SyncController::local(engine, RenderProjector::new(1), ViewerConfig::default());
//!
//! viewer.initialize(Dimensions::cube(10).unwrap()).await.unwrap();
//! viewer.load_pattern_centered("glider").await.unwrap();
//! let info = viewer.step().await.unwrap();
//! assert_eq!(info.generation, 1);
//!
//! let mut surface = RecordingSurface::default();
//! viewer.present(&mut surface);
//! assert_eq!(surface.visible as u64, info.population);
//! # });
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded (`Rc`, not `Arc`). Animation and stream
//! reading run as `spawn_local` tasks, so controllers that animate or stream
//! must live inside a [`tokio::task::LocalSet`].
//!
//! ## Modules
//!
//! - [`engine`]: readiness-gated facade over a compute backend, animation loop
//! - [`stream`]: reconnecting push channel and its WebSocket transport
//! - [`projector`]: sparse cells to fixed-capacity instance buffer
//! - [`controller`]: user actions, source selection, status
//! - [`snapshot`]: normalized universe snapshots
//! - [`config`]: viewer tunables

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod projector;
pub mod snapshot;
pub mod stream;

pub use error::{Result, ViewerError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::ViewerConfig;
    pub use crate::controller::{ControllerState, SourceMode, SyncController, ViewerStatus};
    pub use crate::engine::{
        local_engine, AnimationHandle, ComputeBackend, EngineFacade, Frame, Readiness,
    };
    pub use crate::error::{Result, ViewerError};
    pub use crate::projector::{
        InstanceRaw, InstanceSurface, Projection, RecordingSurface, RenderProjector,
    };
    pub use crate::snapshot::{Cell, Dimensions, Snapshot};
    pub use crate::stream::{
        stream_url, ChannelListener, ConnectionState, Connector, LatestSnapshot, StreamChannel,
        WsConnector,
    };
    pub use life3d::Rule;
}
