//! Plate addressing and hardware handles
//!
//! Wells are addressed by row (A-H) and zero-based column (0-11). The
//! display form uses the plate's printed 1-based label, so column 0 of
//! row A is shown as `A1`.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows on a 96-well plate (A-H)
pub const PLATE_ROWS: usize = 8;

/// Columns on a 96-well plate
pub const PLATE_COLUMNS: usize = 12;

/// Wells on a 96-well plate
pub const WELL_COUNT: usize = PLATE_ROWS * PLATE_COLUMNS;

/// Deck slot number (1-11 on a standard deck)
pub type DeckSlot = u8;

/// Pipette mount on the gantry
///
/// A mount carries at most one pipette, so the mount doubles as the
/// pipette handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mount {
    Left,
    Right,
}

impl Mount {
    /// Both mounts, left first
    pub const ALL: [Mount; 2] = [Mount::Left, Mount::Right];

    /// Stable index for per-mount arrays
    pub const fn index(self) -> usize {
        match self {
            Mount::Left => 0,
            Mount::Right => 1,
        }
    }

    /// Lowercase name as used by robot APIs
    pub const fn as_str(self) -> &'static str {
        match self {
            Mount::Left => "left",
            Mount::Right => "right",
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a loaded piece of labware, issued by the liquid handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabwareId(pub u8);

impl fmt::Display for LabwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "labware#{}", self.0)
    }
}

/// A well position on a 96-well plate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Well {
    row: u8,
    column: u8,
}

impl Well {
    /// Create a well from a row index (0 = A) and zero-based column
    ///
    /// Returns `None` if either index is off the plate.
    pub const fn new(row: usize, column: usize) -> Option<Self> {
        if row < PLATE_ROWS && column < PLATE_COLUMNS {
            Some(Self {
                row: row as u8,
                column: column as u8,
            })
        } else {
            None
        }
    }

    /// Create a well from its row-major index (A1 = 0, A2 = 1, ..., H12 = 95)
    pub const fn from_index(index: usize) -> Option<Self> {
        Self::new(index / PLATE_COLUMNS, index % PLATE_COLUMNS)
    }

    /// Create a well from a row letter and zero-based column
    pub fn from_letter(letter: char, column: usize) -> Option<Self> {
        let letter = letter.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return None;
        }
        Self::new((letter as u8 - b'A') as usize, column)
    }

    /// Parse a printed well label such as `A1` or `h12`
    pub fn parse(label: &str) -> Option<Self> {
        let mut chars = label.chars();
        let letter = chars.next()?;
        let number: usize = chars.as_str().parse().ok()?;
        if number == 0 {
            return None;
        }
        Self::from_letter(letter, number - 1)
    }

    /// Row index (0 = A)
    pub const fn row(&self) -> usize {
        self.row as usize
    }

    /// Zero-based column index
    pub const fn column(&self) -> usize {
        self.column as usize
    }

    /// Row letter (A-H)
    pub const fn row_letter(&self) -> char {
        (b'A' + self.row) as char
    }

    /// Row-major index
    pub const fn index(&self) -> usize {
        self.row as usize * PLATE_COLUMNS + self.column as usize
    }

    /// Iterate all wells in row-major order (A1, A2, ..., A12, B1, ..., H12)
    pub fn all() -> impl Iterator<Item = Well> {
        (0..WELL_COUNT).filter_map(Well::from_index)
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column + 1)
    }
}

/// A specific well on a specific piece of labware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WellRef {
    pub labware: LabwareId,
    pub well: Well,
}

impl WellRef {
    pub const fn new(labware: LabwareId, well: Well) -> Self {
        Self { labware, well }
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.well, self.labware)
    }
}
