//! Fixed-capacity instance buffer fed from sparse cell lists.
//!
//! The buffer is sized once per universe. Each projection writes the visible
//! cells into the leading slots and parks the rest far outside the lattice, so
//! a population that changes every frame never reallocates.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::error::ViewerError;
use crate::snapshot::{Cell, Dimensions};

/// Distance beyond the largest lattice extent at which unused slots sit.
pub const PARK_DISTANCE: f32 = 1000.0;

/// Edge length of a drawn cell, leaving a visible gap between neighbours.
pub const CELL_SCALE: f32 = 0.9;

/// Per-instance vertex data (80 bytes, column-major model matrix).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceRaw {
    pub fn at(translation: [f32; 3], color: [f32; 4]) -> Self {
        let [x, y, z] = translation;
        Self {
            model: [
                [CELL_SCALE, 0.0, 0.0, 0.0],
                [0.0, CELL_SCALE, 0.0, 0.0],
                [0.0, 0.0, CELL_SCALE, 0.0],
                [x, y, z, 1.0],
            ],
            color,
        }
    }

    pub fn parked(at: f32) -> Self {
        Self::at([at, at, at], [0.0; 4])
    }

    pub fn translation(&self) -> [f32; 3] {
        let [x, y, z, _] = self.model[3];
        [x, y, z]
    }
}

/// Receives the instance buffer for drawing.
pub trait InstanceSurface {
    /// `instances[..visible]` are live cells; the remainder are parked.
    fn upload(&mut self, instances: &[InstanceRaw], visible: usize);
}

/// Keeps a copy of the last upload. Used headless and in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub uploads: usize,
    pub instances: Vec<InstanceRaw>,
    pub visible: usize,
}

impl InstanceSurface for RecordingSurface {
    fn upload(&mut self, instances: &[InstanceRaw], visible: usize) {
        self.uploads += 1;
        self.instances.clear();
        self.instances.extend_from_slice(instances);
        self.visible = visible;
    }
}

/// How many of `population` cells get a slot. Overflow is truncated.
pub fn visible_count(population: usize, capacity: usize) -> usize {
    population.min(capacity)
}

/// Buffer size for a universe: half its volume, within `[1, max_capacity]`.
pub fn capacity_for(dims: Dimensions, max_capacity: usize) -> usize {
    let half = usize::try_from(dims.volume() / 2).unwrap_or(usize::MAX);
    half.clamp(1, max_capacity.max(1))
}

pub fn park_position(dims: Dimensions) -> f32 {
    dims.max_extent() as f32 + PARK_DISTANCE
}

/// Green-to-cyan gradient along z.
pub fn depth_color(z: i32, depth: u32) -> [f32; 4] {
    let hue = (z as f32 / depth.max(1) as f32) * 0.3 + 0.3;
    let [r, g, b] = hsl_to_rgb(hue, 1.0, 0.5);
    [r, g, b, 1.0]
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s == 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_channel(p, q, h + 1.0 / 3.0),
        hue_channel(p, q, h),
        hue_channel(p, q, h - 1.0 / 3.0),
    ]
}

fn hue_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Outcome of one [`RenderProjector::project`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Projection {
    pub visible: usize,
    /// Cells that did not fit in the buffer.
    pub dropped: usize,
}

impl Projection {
    /// The overflow as an error value, for callers that want to surface it.
    pub fn capacity_exceeded(&self) -> Option<ViewerError> {
        (self.dropped > 0).then(|| ViewerError::CapacityExceeded {
            population: self.visible + self.dropped,
            capacity: self.visible,
        })
    }
}

#[derive(Debug)]
pub struct RenderProjector {
    instances: Vec<InstanceRaw>,
    active: usize,
    park_at: f32,
    dirty: bool,
}

impl RenderProjector {
    pub fn new(capacity: usize) -> Self {
        let mut projector = Self {
            instances: Vec::new(),
            active: 0,
            park_at: PARK_DISTANCE,
            dirty: false,
        };
        projector.configure(capacity);
        projector
    }

    /// Reallocates the buffer with every slot parked.
    pub fn configure(&mut self, capacity: usize) {
        self.instances = vec![InstanceRaw::parked(self.park_at); capacity];
        self.active = 0;
        self.dirty = true;
        debug!(capacity, "instance buffer configured");
    }

    pub fn capacity(&self) -> usize {
        self.instances.len()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn park_at(&self) -> f32 {
        self.park_at
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn instances(&self) -> &[InstanceRaw] {
        &self.instances
    }

    pub fn project(&mut self, cells: &[Cell], dims: Dimensions) -> Projection {
        let capacity = self.instances.len();
        let visible = visible_count(cells.len(), capacity);

        for (slot, cell) in self.instances.iter_mut().zip(cells) {
            *slot = InstanceRaw::at(
                [
                    cell.x as f32 + 0.5,
                    cell.y as f32 + 0.5,
                    cell.z as f32 + 0.5,
                ],
                depth_color(cell.z, dims.depth),
            );
        }

        // Slots past `active` are already parked unless the park spot moved.
        let park = park_position(dims);
        let stale_end = if park == self.park_at {
            self.active.max(visible)
        } else {
            capacity
        };
        self.park_at = park;
        for slot in &mut self.instances[visible..stale_end] {
            *slot = InstanceRaw::parked(park);
        }

        self.active = visible;
        self.dirty = true;

        let dropped = cells.len() - visible;
        if dropped > 0 {
            debug!(
                population = cells.len(),
                capacity, dropped, "population exceeds instance capacity; truncating"
            );
        }
        Projection { visible, dropped }
    }

    /// Uploads the buffer if it changed since the last upload.
    pub fn present(&mut self, surface: &mut impl InstanceSurface) -> bool {
        if !self.dirty {
            return false;
        }
        surface.upload(&self.instances, self.active);
        self.dirty = false;
        true
    }
}
