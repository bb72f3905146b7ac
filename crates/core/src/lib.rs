//! # life3d
//!
//! A three-dimensional Game of Life engine (Carter Bays' B6/S567 family) and
//! the JSON-tagged compute capability that viewers drive it through.
//!
//! ## Quick Start
//!
//! ```
//! use life3d::prelude::*;
//!
//! let mut universe = Universe3D::new(Size3::cube(10), Rule::B6_S567).unwrap();
//! patterns::by_name("glider").unwrap().load_into(&mut universe, 3, 3, 3);
//! assert_eq!(universe.population(), 10);
//!
//! universe.step();
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: step z-slices concurrently via rayon
//!
//! ## Modules
//!
//! - [`universe`]: dense lattice storage and the transition step
//! - [`rule`]: birth/survival rules in `B…/S…` notation
//! - [`patterns`]: the Bays 3D pattern catalog
//! - [`bridge`]: request/response capability returning tagged JSON values
//! - [`state`]: wire types shared with viewers and the push daemon

#[path = "core/error.rs"]
pub mod error;

#[path = "core/rule.rs"]
pub mod rule;

#[path = "core/universe.rs"]
pub mod universe;

#[path = "core/patterns.rs"]
pub mod patterns;

#[path = "core/state.rs"]
pub mod state;

#[path = "core/bridge.rs"]
pub mod bridge;

pub use bridge::Bridge;
pub use error::Error;
pub use rule::Rule;

/// Prelude module for convenient imports.
///
/// ```
/// use life3d::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bridge::Bridge;
    pub use crate::error::Error;
    pub use crate::patterns::{self, Pattern3D};
    pub use crate::rule::Rule;
    pub use crate::state::{CellData, UniverseInfo, UniverseState};
    pub use crate::universe::{Size3, Universe3D};
}
