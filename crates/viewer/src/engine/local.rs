//! In-process backend: the reference `life3d` bridge.

use serde_json::Value;

use life3d::{Bridge, Rule};

use super::{ComputeBackend, EngineFacade};

impl ComputeBackend for Bridge {
    fn init(&mut self, width: i64, height: i64, depth: i64) -> Value {
        self.init_universe(width, height, depth)
    }

    fn load_pattern(&mut self, name: &str, x: i64, y: i64, z: i64) -> Value {
        Bridge::load_pattern(self, name, x, y, z)
    }

    fn step(&mut self) -> Value {
        Bridge::step(self)
    }

    fn living_cells(&mut self) -> Value {
        Bridge::living_cells(self)
    }

    fn universe_info(&mut self) -> Value {
        Bridge::universe_info(self)
    }

    fn clear(&mut self) -> Value {
        self.clear_universe()
    }

    fn set_cell(&mut self, x: i64, y: i64, z: i64, alive: bool) -> Value {
        Bridge::set_cell(self, x, y, z, alive)
    }
}

/// A ready facade over a fresh in-process universe.
pub fn local_engine(rule: Rule) -> EngineFacade {
    EngineFacade::with_backend(Box::new(Bridge::with_rule(rule)))
}
