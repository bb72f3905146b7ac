//! Carter Bays' catalog of B6/S567 structures (1987).
//!
//! Coordinates are relative to the pattern origin; loading adds an offset and
//! drops anything that lands outside the universe.

use crate::universe::Universe3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Spaceship,
    Oscillator,
    StillLife,
}

#[derive(Debug, Clone, Copy)]
pub struct Pattern3D {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: PatternKind,
    /// Footprint reserved when placing the pattern.
    pub extent: (usize, usize, usize),
    pub cells: &'static [(i32, i32, i32)],
}

impl Pattern3D {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn load_into(&self, universe: &mut Universe3D, x: i64, y: i64, z: i64) {
        for &(cx, cy, cz) in self.cells {
            universe.set(x + cx as i64, y + cy as i64, z + cz as i64, true);
        }
    }
}

pub const BAYS_GLIDER: Pattern3D = Pattern3D {
    name: "Bays's Glider",
    description: "Period-4 glider, moves one diagonal cell every 4 generations",
    kind: PatternKind::Spaceship,
    extent: (5, 5, 4),
    cells: &[
        (1, 0, 0),
        (2, 0, 0),
        (0, 1, 0),
        (2, 1, 0),
        (1, 2, 0),
        (1, 0, 1),
        (2, 0, 1),
        (0, 1, 1),
        (2, 1, 1),
        (1, 2, 1),
    ],
};

pub const BLOCK: Pattern3D = Pattern3D {
    name: "3D Block",
    description: "Stable 2x2x2 cube",
    kind: PatternKind::StillLife,
    extent: (3, 3, 3),
    cells: &[
        (0, 0, 0),
        (1, 0, 0),
        (0, 1, 0),
        (1, 1, 0),
        (0, 0, 1),
        (1, 0, 1),
        (0, 1, 1),
        (1, 1, 1),
    ],
};

pub const BEEHIVE: Pattern3D = Pattern3D {
    name: "3D Beehive",
    description: "Stable beehive structure",
    kind: PatternKind::StillLife,
    extent: (5, 4, 4),
    cells: &[
        (1, 0, 0),
        (2, 0, 0),
        (0, 1, 0),
        (3, 1, 0),
        (1, 2, 0),
        (2, 2, 0),
        (1, 0, 1),
        (2, 0, 1),
        (0, 1, 1),
        (3, 1, 1),
        (1, 2, 1),
        (2, 2, 1),
        (1, 1, 2),
        (2, 1, 2),
    ],
};

pub const BUCKET: Pattern3D = Pattern3D {
    name: "Bucket",
    description: "Stable container structure",
    kind: PatternKind::StillLife,
    extent: (5, 5, 3),
    cells: &[
        (1, 1, 0),
        (2, 1, 0),
        (1, 2, 0),
        (2, 2, 0),
        (0, 0, 1),
        (1, 0, 1),
        (2, 0, 1),
        (3, 0, 1),
        (0, 3, 1),
        (1, 3, 1),
        (2, 3, 1),
        (3, 3, 1),
        (0, 1, 1),
        (0, 2, 1),
        (3, 1, 1),
        (3, 2, 1),
    ],
};

pub const BLINKER: Pattern3D = Pattern3D {
    name: "3D Blinker",
    description: "Period-2 oscillator, a three-cell bar in two planes",
    kind: PatternKind::Oscillator,
    extent: (4, 3, 3),
    cells: &[(0, 1, 0), (1, 1, 0), (2, 1, 0), (0, 1, 1), (1, 1, 1), (2, 1, 1)],
};

pub const FLASHLIGHT: Pattern3D = Pattern3D {
    name: "Flashlight",
    description: "Period-4 oscillator flipping between mirror images",
    kind: PatternKind::Oscillator,
    extent: (5, 5, 4),
    cells: &[
        (1, 1, 0),
        (2, 1, 0),
        (1, 2, 0),
        (2, 2, 0),
        (0, 1, 1),
        (3, 1, 1),
        (1, 0, 1),
        (2, 0, 1),
        (1, 3, 1),
        (2, 3, 1),
        (1, 1, 2),
        (2, 1, 2),
        (1, 2, 2),
        (2, 2, 2),
    ],
};

pub const WHEEL: Pattern3D = Pattern3D {
    name: "Wheel",
    description: "Period-2 ring that turns half a revolution each tick",
    kind: PatternKind::Oscillator,
    extent: (5, 5, 4),
    cells: &[
        (0, 1, 1),
        (1, 0, 1),
        (2, 0, 1),
        (3, 1, 1),
        (3, 2, 1),
        (2, 3, 1),
        (1, 3, 1),
        (0, 2, 1),
        (1, 1, 0),
        (2, 2, 0),
        (1, 2, 2),
        (2, 1, 2),
    ],
};

/// Names accepted by [`by_name`], aliases included.
pub const NAMES: &[&str] = &[
    "bays-glider",
    "glider",
    "blinker",
    "flashlight",
    "wheel",
    "oscillator",
    "block",
    "beehive",
    "bucket",
];

pub fn by_name(name: &str) -> Option<&'static Pattern3D> {
    match name {
        "bays-glider" | "glider" => Some(&BAYS_GLIDER),
        "blinker" | "oscillator" => Some(&BLINKER),
        "flashlight" => Some(&FLASHLIGHT),
        "wheel" => Some(&WHEEL),
        "block" => Some(&BLOCK),
        "beehive" => Some(&BEEHIVE),
        "bucket" => Some(&BUCKET),
        _ => None,
    }
}
