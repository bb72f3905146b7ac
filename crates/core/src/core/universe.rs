//! Dense 3D lattice with double-buffered stepping.
//!
//! Cells live in a flat array indexed `z * height * width + y * width + x`.
//! The lattice is bounded: neighbours outside the volume count as dead.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Error;
use crate::rule::Rule;
use crate::state::CellData;

const DEAD: u8 = 0;
const ALIVE: u8 = 1;

/// Largest lattice `Universe3D::new` will allocate (two bytes per cell).
pub const MAX_CELLS: usize = 1 << 24;

/// Lattice extent along x, y and z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size3 {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Size3 {
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub const fn cube(n: usize) -> Self {
        Self::new(n, n, n)
    }

    /// `None` when the cell count does not fit in `usize`.
    pub fn volume(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.depth)
    }

    fn plane(&self) -> usize {
        self.width * self.height
    }
}

#[derive(Debug, Clone)]
pub struct Universe3D {
    size: Size3,
    rule: Rule,
    cells: Vec<u8>,
    next: Vec<u8>,
}

impl Universe3D {
    pub fn new(size: Size3, rule: Rule) -> Result<Self, Error> {
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(Error::InvalidDimensions);
        }
        let volume = match size.volume() {
            Some(volume) if volume <= MAX_CELLS => volume,
            _ => {
                return Err(Error::TooLarge {
                    width: size.width,
                    height: size.height,
                    depth: size.depth,
                })
            }
        };
        Ok(Self {
            size,
            rule,
            cells: vec![DEAD; volume],
            next: vec![DEAD; volume],
        })
    }

    pub fn size(&self) -> Size3 {
        self.size
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    fn index(&self, x: i64, y: i64, z: i64) -> Option<usize> {
        let Size3 {
            width,
            height,
            depth,
        } = self.size;
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= width || y >= height || z >= depth {
            return None;
        }
        Some(z * height * width + y * width + x)
    }

    /// Out-of-range coordinates read as dead.
    pub fn get(&self, x: i64, y: i64, z: i64) -> bool {
        self.index(x, y, z)
            .map(|i| self.cells[i] != DEAD)
            .unwrap_or(false)
    }

    /// Writes outside the lattice are ignored.
    pub fn set(&mut self, x: i64, y: i64, z: i64, alive: bool) {
        if let Some(i) = self.index(x, y, z) {
            self.cells[i] = if alive { ALIVE } else { DEAD };
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(DEAD);
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&c| c != DEAD).count()
    }

    /// Living cells in x-fastest, then y, then z order.
    pub fn living_cells(&self) -> Vec<CellData> {
        let width = self.size.width;
        let plane = self.size.plane();
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != DEAD)
            .map(|(i, _)| CellData {
                x: (i % width) as i32,
                y: ((i % plane) / width) as i32,
                z: (i / plane) as i32,
            })
            .collect()
    }

    /// Advance one generation.
    pub fn step(&mut self) {
        let size = self.size;
        let rule = self.rule;
        let cells = &self.cells;
        let plane = size.plane();

        #[cfg(feature = "parallel")]
        self.next
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(z, out)| fill_plane(cells, size, rule, z, out));

        #[cfg(not(feature = "parallel"))]
        self.next
            .chunks_mut(plane)
            .enumerate()
            .for_each(|(z, out)| fill_plane(cells, size, rule, z, out));

        core::mem::swap(&mut self.cells, &mut self.next);
    }
}

fn fill_plane(cells: &[u8], size: Size3, rule: Rule, z: usize, out: &mut [u8]) {
    let Size3 {
        width,
        height,
        depth,
    } = size;
    let plane = size.plane();
    let z_lo = z.saturating_sub(1);
    let z_hi = (z + 1).min(depth - 1);

    for y in 0..height {
        let y_lo = y.saturating_sub(1);
        let y_hi = (y + 1).min(height - 1);
        for x in 0..width {
            let x_lo = x.saturating_sub(1);
            let x_hi = (x + 1).min(width - 1);

            let mut count = 0u8;
            for nz in z_lo..=z_hi {
                for ny in y_lo..=y_hi {
                    let row = nz * plane + ny * width;
                    for nx in x_lo..=x_hi {
                        count += cells[row + nx];
                    }
                }
            }

            let here = cells[z * plane + y * width + x];
            // The 3x3x3 sum includes the centre cell.
            let neighbors = count - here;
            out[y * width + x] = if rule.next_state(here != DEAD, neighbors) {
                ALIVE
            } else {
                DEAD
            };
        }
    }
}
