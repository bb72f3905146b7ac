//! Normalized universe snapshots.
//!
//! Whatever shape the engine or the stream hands over, the rest of the viewer
//! only ever sees a [`Snapshot`]: unique cells, a population equal to the
//! cell count, and validated dimensions.

use hashbrown::HashSet;
use serde::Deserialize;
use tracing::debug;

use life3d::state::{CellData, UniverseInfo, UniverseState};

use crate::error::{Result, ViewerError};

pub type Cell = CellData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32, depth: u32) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(ViewerError::InvalidArgument(format!(
                "dimensions must be positive, got {width}x{height}x{depth}"
            )));
        }
        Ok(Self {
            width,
            height,
            depth,
        })
    }

    pub fn cube(n: u32) -> Result<Self> {
        Self::new(n, n, n)
    }

    pub fn volume(&self) -> u64 {
        (self.width as u64)
            .saturating_mul(self.height as u64)
            .saturating_mul(self.depth as u64)
    }

    pub fn max_extent(&self) -> u32 {
        self.width.max(self.height).max(self.depth)
    }

    pub fn of_info(info: &UniverseInfo) -> Result<Self> {
        Self::new(info.width, info.height, info.depth)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// One generation of a universe. Never partially applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    dimensions: Dimensions,
    generation: u64,
    cells: Vec<Cell>,
}

impl Snapshot {
    pub fn empty(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            generation: 0,
            cells: Vec::new(),
        }
    }

    /// Drops repeated coordinates, keeping the first occurrence.
    pub fn new(dimensions: Dimensions, generation: u64, cells: Vec<Cell>) -> Self {
        let mut seen = HashSet::with_capacity(cells.len());
        let mut cells = cells;
        cells.retain(|c| seen.insert(*c));
        Self {
            dimensions,
            generation,
            cells,
        }
    }

    pub fn from_state(state: UniverseState) -> Result<Self> {
        let dimensions = Dimensions::new(state.width, state.height, state.depth)
            .map_err(|e| ViewerError::Parse(e.to_string()))?;
        let declared = state.population;
        let snapshot = Self::new(dimensions, state.generation, state.cells);
        if declared != snapshot.population() {
            debug!(
                declared,
                actual = snapshot.population(),
                generation = snapshot.generation,
                "population disagrees with cell list; using cell count"
            );
        }
        Ok(snapshot)
    }

    /// Parses a full-snapshot JSON document as pushed by the stream server.
    pub fn parse(text: &str) -> Result<Self> {
        let state: UniverseState = serde_json::from_str(text)?;
        Self::from_state(state)
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn population(&self) -> u64 {
        self.cells.len() as u64
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn info(&self) -> UniverseInfo {
        UniverseInfo {
            width: self.dimensions.width,
            height: self.dimensions.height,
            depth: self.dimensions.depth,
            generation: self.generation,
            population: self.population(),
        }
    }
}

/// Cell-list response from a compute backend.
///
/// Backends may answer with the full state or with only `cells`; whatever is
/// missing is filled from `query_info`.
#[derive(Debug, Deserialize)]
pub(crate) struct CellsPayload {
    #[serde(default)]
    pub cells: Vec<Cell>,
    pub generation: Option<u64>,
    pub population: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
}

impl CellsPayload {
    /// Returns the complete state if nothing is missing.
    pub fn into_state(self) -> std::result::Result<UniverseState, Self> {
        match (self.generation, self.width, self.height, self.depth) {
            (Some(generation), Some(width), Some(height), Some(depth)) => Ok(UniverseState {
                population: self.population.unwrap_or(self.cells.len() as u64),
                cells: self.cells,
                generation,
                width,
                height,
                depth,
            }),
            _ => Err(self),
        }
    }

    pub fn complete_with(self, info: &UniverseInfo) -> UniverseState {
        UniverseState {
            population: self.population.unwrap_or(self.cells.len() as u64),
            cells: self.cells,
            generation: self.generation.unwrap_or(info.generation),
            width: self.width.unwrap_or(info.width),
            height: self.height.unwrap_or(info.height),
            depth: self.depth.unwrap_or(info.depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: i32, y: i32, z: i32) -> Cell {
        Cell { x, y, z }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(Dimensions::new(0, 1, 1).is_err());
        assert!(Dimensions::cube(0).is_err());
        assert_eq!(Dimensions::new(2, 3, 4).unwrap().volume(), 24);
        assert_eq!(Dimensions::new(2, 9, 4).unwrap().max_extent(), 9);
        assert_eq!(Dimensions::cube(u32::MAX).unwrap().volume(), u64::MAX);
    }

    #[test]
    fn duplicates_are_removed_first_wins() {
        let dims = Dimensions::cube(4).unwrap();
        let s = Snapshot::new(
            dims,
            3,
            vec![cell(1, 1, 1), cell(0, 0, 0), cell(1, 1, 1), cell(2, 0, 0)],
        );
        assert_eq!(s.cells(), &[cell(1, 1, 1), cell(0, 0, 0), cell(2, 0, 0)]);
        assert_eq!(s.population(), 3);
    }

    #[test]
    fn declared_population_is_replaced_by_cell_count() {
        let text = r#"{"width":8,"height":8,"depth":8,"generation":12,
            "population":99,"cells":[{"x":1,"y":2,"z":3},{"x":1,"y":2,"z":3}]}"#;
        let s = Snapshot::parse(text).unwrap();
        assert_eq!(s.population(), 1);
        assert_eq!(s.generation(), 12);
        assert_eq!(s.info().population, 1);
    }

    #[test]
    fn malformed_documents_are_parse_errors() {
        assert!(matches!(
            Snapshot::parse("{not json"),
            Err(ViewerError::Parse(_))
        ));
        assert!(matches!(
            Snapshot::parse(r#"{"cells":[]}"#),
            Err(ViewerError::Parse(_))
        ));
        let zero = r#"{"width":0,"height":8,"depth":8,"generation":0,"population":0,"cells":[]}"#;
        assert!(matches!(Snapshot::parse(zero), Err(ViewerError::Parse(_))));
    }

    #[test]
    fn partial_cell_payload_is_completed_from_info() {
        let payload: CellsPayload =
            serde_json::from_str(r#"{"cells":[{"x":0,"y":1,"z":2}]}"#).unwrap();
        let payload = payload.into_state().unwrap_err();
        let info = UniverseInfo {
            width: 5,
            height: 6,
            depth: 7,
            generation: 4,
            population: 1,
        };
        let state = payload.complete_with(&info);
        assert_eq!((state.width, state.height, state.depth), (5, 6, 7));
        assert_eq!(state.generation, 4);
        assert_eq!(state.population, 1);
    }

    #[test]
    fn payload_without_cells_is_an_empty_universe() {
        let payload: CellsPayload = serde_json::from_str(
            r#"{"width":3,"height":3,"depth":3,"generation":2,"population":0}"#,
        )
        .unwrap();
        let state = payload.into_state().unwrap();
        assert!(state.cells.is_empty());
        let snapshot = Snapshot::from_state(state).unwrap();
        assert_eq!((snapshot.generation(), snapshot.population()), (2, 0));
    }
}
