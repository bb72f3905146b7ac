//! JSON wire types.
//!
//! `UniverseState` is the full-snapshot payload both the bridge's
//! `getLivingCells` response and the push daemon's WebSocket frames carry.

use serde::{Deserialize, Serialize};

use crate::universe::Universe3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellData {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UniverseState {
    pub cells: Vec<CellData>,
    pub generation: u64,
    pub population: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UniverseInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub generation: u64,
    pub population: u64,
}

impl UniverseState {
    pub fn capture(universe: &Universe3D, generation: u64) -> Self {
        let size = universe.size();
        let cells = universe.living_cells();
        Self {
            population: cells.len() as u64,
            cells,
            generation,
            width: size.width as u32,
            height: size.height as u32,
            depth: size.depth as u32,
        }
    }
}

impl UniverseInfo {
    pub fn capture(universe: &Universe3D, generation: u64) -> Self {
        let size = universe.size();
        Self {
            width: size.width as u32,
            height: size.height as u32,
            depth: size.depth as u32,
            generation,
            population: universe.population() as u64,
        }
    }
}
