use core::fmt;
use core::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A grid coordinate. Signed so neighbor offsets can step off the edge and be
/// rejected by the bounds check instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn offset(self, by: Offset) -> Self {
        Self {
            row: self.row.saturating_add(by.row),
            col: self.col.saturating_add(by.col),
        }
    }

    /// Euclidean distance.
    #[inline]
    pub fn distance(self, other: Cell) -> f64 {
        let dr = (self.row as f64) - (other.row as f64);
        let dc = (self.col as f64) - (other.col as f64);
        (dr * dr + dc * dc).sqrt()
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

/// A unit or diagonal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset {
    pub row: i32,
    pub col: i32,
}

impl Offset {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Neighbor order is part of the contract: greedy ties resolve to the first
/// entry, and the 4-connected set is the first four entries.
pub const NEIGHBORS_8: [Offset; 8] = [
    Offset::new(0, 1),
    Offset::new(0, -1),
    Offset::new(1, 0),
    Offset::new(-1, 0),
    Offset::new(1, 1),
    Offset::new(-1, 1),
    Offset::new(1, -1),
    Offset::new(-1, -1),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl Connectivity {
    pub fn offsets(self) -> &'static [Offset] {
        match self {
            Connectivity::Four => &NEIGHBORS_8[..4],
            Connectivity::Eight => &NEIGHBORS_8,
        }
    }
}

/// Dense `height x width` matrix stored row-major in one buffer.
///
/// `Index<Cell>` panics on out-of-bounds access; use [`Grid::get`] when the
/// cell may be outside the grid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid<T> {
    height: usize,
    width: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn filled(height: usize, width: usize, value: T) -> Self {
        Self {
            height,
            width,
            cells: vec![value; height * width],
        }
    }
}

impl<T> Grid<T> {
    /// Wrap a row-major buffer. Returns `None` if the length does not match.
    pub fn from_vec(height: usize, width: usize, cells: Vec<T>) -> Option<Self> {
        if height.checked_mul(width)? != cells.len() {
            return None;
        }
        Some(Self {
            height,
            width,
            cells,
        })
    }

    /// Build from nested rows. Returns `None` for ragged input.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        let cells = rows.into_iter().flatten().collect();
        Some(Self {
            height,
            width,
            cells,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.height
            && (cell.col as usize) < self.width
    }

    #[inline]
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        if self.contains(cell) {
            Some(cell.row as usize * self.width + cell.col as usize)
        } else {
            None
        }
    }

    pub fn cell_at(&self, index: usize) -> Cell {
        let w = self.width.max(1);
        Cell::new((index / w) as i32, (index % w) as i32)
    }

    #[inline]
    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.index_of(cell).map(|i| &self.cells[i])
    }

    #[inline]
    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut T> {
        self.index_of(cell).map(move |i| &mut self.cells[i])
    }

    /// Returns `false` (and drops `value`) when the cell is out of bounds.
    pub fn set(&mut self, cell: Cell, value: T) -> bool {
        match self.get_mut(cell) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.cells.chunks(self.width.max(1))
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (Cell, &T)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.cell_at(i), v))
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            height: self.height,
            width: self.width,
            cells: self.cells.iter().map(f).collect(),
        }
    }

    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.height == other.height && self.width == other.width
    }
}

impl<T: Clone> Grid<T> {
    pub fn to_nested(&self) -> Vec<Vec<T>> {
        self.rows().map(<[T]>::to_vec).collect()
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    fn index(&self, cell: Cell) -> &T {
        match self.index_of(cell) {
            Some(i) => &self.cells[i],
            None => panic!(
                "cell {} out of bounds for {}x{} grid",
                cell, self.height, self.width
            ),
        }
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    fn index_mut(&mut self, cell: Cell) -> &mut T {
        let (h, w) = (self.height, self.width);
        match self.index_of(cell) {
            Some(i) => &mut self.cells[i],
            None => panic!("cell {} out of bounds for {}x{} grid", cell, h, w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_layout() {
        let g = Grid::from_vec(2, 3, vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(g[Cell::new(0, 2)], 2);
        assert_eq!(g[Cell::new(1, 0)], 3);
        assert_eq!(g.index_of(Cell::new(1, 2)), Some(5));
        assert_eq!(g.cell_at(4), Cell::new(1, 1));
    }

    #[test]
    fn bounds_are_checked() {
        let mut g = Grid::filled(2, 2, 0.0f64);
        assert!(g.get(Cell::new(-1, 0)).is_none());
        assert!(g.get(Cell::new(0, 2)).is_none());
        assert!(!g.set(Cell::new(2, 0), 1.0));
        assert!(g.set(Cell::new(1, 1), 1.0));
        assert_eq!(g[Cell::new(1, 1)], 1.0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_panics_outside() {
        let g = Grid::filled(1, 1, 0u8);
        let _ = g[Cell::new(0, 1)];
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(Grid::from_vec(2, 2, vec![1, 2, 3]).is_none());
        assert!(Grid::<u8>::from_rows(vec![vec![1, 2], vec![3]]).is_none());
    }

    #[test]
    fn nested_roundtrip_preserves_rows() {
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let g = Grid::from_rows(rows.clone()).unwrap();
        assert_eq!(g.height(), 2);
        assert_eq!(g.width(), 3);
        assert_eq!(g.to_nested(), rows);
    }

    #[test]
    fn four_connected_is_prefix_of_eight() {
        assert_eq!(Connectivity::Four.offsets(), &NEIGHBORS_8[..4]);
        assert_eq!(Connectivity::Eight.offsets().len(), 8);
        assert!(Connectivity::Four
            .offsets()
            .iter()
            .all(|o| o.row.abs() + o.col.abs() == 1));
    }

    #[test]
    fn distances() {
        let a = Cell::new(0, 0);
        let b = Cell::new(3, 4);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(a.manhattan(b), 7);
    }
}
