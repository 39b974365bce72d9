//! Plate-shaped grids
//!
//! A [`PlateGrid`] holds one value per well of a 96-well plate, indexed by
//! [`Well`]. Iteration is always row-major (A1, A2, ..., H12).

use core::ops::{Index, IndexMut};

use dilutor_hal::{Well, PLATE_COLUMNS, PLATE_ROWS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One value per well
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlateGrid<T> {
    cells: [[T; PLATE_COLUMNS]; PLATE_ROWS],
}

/// Measured optical densities
pub type MeasurementGrid = PlateGrid<f64>;

/// Transfer volumes in µL
pub type VolumeGrid = PlateGrid<f64>;

impl<T: Copy> PlateGrid<T> {
    /// Create a grid with every well set to `value`
    pub const fn filled(value: T) -> Self {
        Self {
            cells: [[value; PLATE_COLUMNS]; PLATE_ROWS],
        }
    }

    /// Create a grid from rows A-H
    pub const fn from_rows(cells: [[T; PLATE_COLUMNS]; PLATE_ROWS]) -> Self {
        Self { cells }
    }

    /// Get the value of one well
    pub fn get(&self, well: Well) -> T {
        self.cells[well.row()][well.column()]
    }

    /// Set the value of one well
    pub fn set(&mut self, well: Well, value: T) {
        self.cells[well.row()][well.column()] = value;
    }

    /// Access the raw rows (A-H)
    pub fn rows(&self) -> &[[T; PLATE_COLUMNS]; PLATE_ROWS] {
        &self.cells
    }

    /// Iterate `(well, value)` pairs in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Well, T)> + '_ {
        Well::all().map(move |well| (well, self.get(well)))
    }

    /// Apply `f` to every cell, keeping the plate layout
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> PlateGrid<U> {
        PlateGrid {
            cells: core::array::from_fn(|row| {
                core::array::from_fn(|column| f(self.cells[row][column]))
            }),
        }
    }
}

impl PlateGrid<f64> {
    /// Sum over all strictly positive cells
    pub fn positive_total(&self) -> f64 {
        self.iter().map(|(_, v)| v).filter(|v| *v > 0.0).sum()
    }

    /// Number of strictly positive cells
    pub fn positive_count(&self) -> usize {
        self.iter().filter(|(_, v)| *v > 0.0).count()
    }
}

impl<T: Copy + Default> Default for PlateGrid<T> {
    fn default() -> Self {
        Self::filled(T::default())
    }
}

impl<T> Index<Well> for PlateGrid<T> {
    type Output = T;

    fn index(&self, well: Well) -> &T {
        &self.cells[well.row()][well.column()]
    }
}

impl<T> IndexMut<Well> for PlateGrid<T> {
    fn index_mut(&mut self, well: Well) -> &mut T {
        &mut self.cells[well.row()][well.column()]
    }
}
