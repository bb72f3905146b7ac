//! Request/response compute capability.
//!
//! Every call returns a JSON value. Failures carry an `error` field; success
//! never does. `living_cells` answers with the snapshot encoded as a JSON
//! *string*, matching hosts that can only pass strings across the boundary.

use serde_json::{json, Value};

use crate::error::Error;
use crate::patterns;
use crate::rule::Rule;
use crate::state::{UniverseInfo, UniverseState};
use crate::universe::{Size3, Universe3D};

#[derive(Debug, Clone, Default)]
pub struct Bridge {
    rule: Rule,
    universe: Option<Universe3D>,
    generation: u64,
}

fn error_value(err: impl ToString) -> Value {
    json!({ "error": err.to_string() })
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(rule: Rule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn universe_mut(&mut self) -> Result<&mut Universe3D, Error> {
        self.universe.as_mut().ok_or(Error::NotInitialized)
    }

    /// Typed view of the current state, for in-process consumers.
    pub fn state(&self) -> Result<UniverseState, Error> {
        let u = self.universe.as_ref().ok_or(Error::NotInitialized)?;
        Ok(UniverseState::capture(u, self.generation))
    }

    pub fn info(&self) -> Result<UniverseInfo, Error> {
        let u = self.universe.as_ref().ok_or(Error::NotInitialized)?;
        Ok(UniverseInfo::capture(u, self.generation))
    }

    pub fn init_universe(&mut self, width: i64, height: i64, depth: i64) -> Value {
        if width <= 0 || height <= 0 || depth <= 0 {
            return error_value(Error::InvalidDimensions);
        }
        let size = Size3::new(width as usize, height as usize, depth as usize);
        match Universe3D::new(size, self.rule) {
            Ok(u) => {
                self.universe = Some(u);
                self.generation = 0;
                json!({
                    "success": true,
                    "width": width,
                    "height": height,
                    "depth": depth,
                })
            }
            Err(e) => error_value(e),
        }
    }

    pub fn load_pattern(&mut self, name: &str, x: i64, y: i64, z: i64) -> Value {
        let universe = match self.universe_mut() {
            Ok(u) => u,
            Err(e) => return error_value(e),
        };
        let Some(pattern) = patterns::by_name(name) else {
            return error_value(Error::UnknownPattern(name.to_string()));
        };
        pattern.load_into(universe, x, y, z);
        json!({
            "success": true,
            "pattern": name,
            "x": x,
            "y": y,
            "z": z,
        })
    }

    pub fn step(&mut self) -> Value {
        match self.universe_mut() {
            Ok(u) => u.step(),
            Err(e) => return error_value(e),
        }
        self.generation += 1;
        json!({ "success": true, "generation": self.generation })
    }

    pub fn living_cells(&self) -> Value {
        let state = match self.state() {
            Ok(s) => s,
            Err(e) => return error_value(e),
        };
        match serde_json::to_string(&state) {
            Ok(encoded) => Value::String(encoded),
            Err(e) => error_value(format!("failed to marshal state: {e}")),
        }
    }

    pub fn universe_info(&self) -> Value {
        match self.info() {
            Ok(info) => json!(info),
            Err(e) => error_value(e),
        }
    }

    pub fn clear_universe(&mut self) -> Value {
        match self.universe_mut() {
            Ok(u) => u.clear(),
            Err(e) => return error_value(e),
        }
        self.generation = 0;
        json!({ "success": true })
    }

    pub fn set_cell(&mut self, x: i64, y: i64, z: i64, alive: bool) -> Value {
        match self.universe_mut() {
            Ok(u) => u.set(x, y, z, alive),
            Err(e) => return error_value(e),
        }
        json!({ "success": true })
    }
}
