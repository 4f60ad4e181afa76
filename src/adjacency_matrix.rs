use std::collections::HashMap;

use roaring::RoaringTreemap;

use crate::Weight;

// Row-major layout: entry (row, column) of a `size`-wide square matrix lives
// at `row * size + column`.
#[inline]
pub(crate) fn index_from_row_column(row: u32, column: u32, size: u32) -> u64 {
    u64::from(row) * u64::from(size) + u64::from(column)
}

#[inline]
pub(crate) fn row_column_from_index(index: u64, size: u32) -> (u32, u32) {
    let size = u64::from(size);
    // Both quotient and remainder are bounded by `size`, itself a u32.
    let row = (index / size) as u32;
    let column = (index % size) as u32;
    (row, column)
}

/// A zero-indexed, row-major square matrix of optional edge weights that can
/// grow in place.
///
/// Which cells are occupied is tracked in a roaring bitmap, so an empty matrix
/// costs a constant amount of memory regardless of its capacity and a row is
/// a contiguous range of indexes.  The weights themselves
/// are kept in a side table keyed by the same index.
#[derive(Clone, Debug, Default)]
pub struct WeightedAdjacencyMatrix {
    capacity: u32,
    ones: RoaringTreemap,
    weights: HashMap<u64, Weight>,
}

impl Eq for WeightedAdjacencyMatrix {}

impl PartialEq for WeightedAdjacencyMatrix {
    fn eq(&self, other: &Self) -> bool {
        if self.capacity != other.capacity {
            return false;
        }
        self.iter_ones().eq(other.iter_ones())
    }
}

impl WeightedAdjacencyMatrix {
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            ones: RoaringTreemap::new(),
            weights: HashMap::new(),
        }
    }

    /// Number of rows (and columns).
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    fn index(&self, i: u32, j: u32) -> u64 {
        assert!(i < self.capacity);
        assert!(j < self.capacity);
        index_from_row_column(i, j, self.capacity)
    }

    pub fn contains(&self, i: u32, j: u32) -> bool {
        let index = self.index(i, j);
        self.ones.contains(index)
    }

    pub fn get(&self, i: u32, j: u32) -> Option<Weight> {
        let index = self.index(i, j);
        self.weights.get(&index).copied()
    }

    /// Returns the previous value.
    pub fn insert(&mut self, i: u32, j: u32, weight: Weight) -> Option<Weight> {
        let index = self.index(i, j);
        self.ones.insert(index);
        self.weights.insert(index, weight)
    }

    /// Returns the previous value.
    pub fn remove(&mut self, i: u32, j: u32) -> Option<Weight> {
        let index = self.index(i, j);
        self.ones.remove(index);
        self.weights.remove(&index)
    }

    /// Empties both row `k` and column `k`.  Returns how many cells were
    /// occupied, counting the diagonal cell `(k, k)` once.
    pub fn clear_row_and_column(&mut self, k: u32) -> usize {
        let mut cleared: Vec<(u32, u32)> = self.iter_ones_at_row(k).map(|j| (k, j)).collect();
        cleared.extend(
            self.iter_ones_at_column(k)
                .filter(|i| *i != k)
                .map(|i| (i, k)),
        );
        for (i, j) in &cleared {
            self.remove(*i, *j);
        }
        cleared.len()
    }

    /// Reallocates the matrix to `new_capacity` rows and columns, moving every
    /// occupied cell to its index in the wider layout.
    pub fn grow(&mut self, new_capacity: u32) {
        assert!(new_capacity >= self.capacity);
        if new_capacity == self.capacity {
            return;
        }
        cov_mark::hit!(adjacency_matrix_grows);
        let old_capacity = self.capacity;
        // Row-major order is preserved by the remapping, so the new bitmap is
        // built from an already sorted sequence.
        let remapped: Vec<(u64, u64)> = self
            .ones
            .iter()
            .map(|index| {
                let (i, j) = row_column_from_index(index, old_capacity);
                (index, index_from_row_column(i, j, new_capacity))
            })
            .collect();
        let mut weights = HashMap::with_capacity(self.weights.len());
        for (old_index, new_index) in &remapped {
            if let Some(weight) = self.weights.get(old_index) {
                weights.insert(*new_index, *weight);
            }
        }
        self.ones = remapped.into_iter().map(|(_, new_index)| new_index).collect();
        self.weights = weights;
        self.capacity = new_capacity;
        tracing::debug!(
            old_capacity,
            new_capacity,
            remapped = self.weights.len(),
            "grew adjacency matrix"
        );
    }

    /// Empties the matrix while keeping its capacity.
    pub fn clear(&mut self) {
        self.ones.clear();
        self.weights.clear();
    }

    /// Iterates over `(row, column, weight)` in row-major order.
    pub fn iter_ones(&self) -> impl Iterator<Item = (u32, u32, Weight)> + '_ {
        self.ones.iter().filter_map(move |index| {
            let (i, j) = row_column_from_index(index, self.capacity);
            self.weights.get(&index).map(|weight| (i, j, *weight))
        })
    }

    /// A row is a run of consecutive indexes, so it is cut out of the bitmap
    /// with a single range mask.
    pub fn iter_ones_at_row(&self, i: u32) -> impl Iterator<Item = u32> + '_ {
        assert!(i < self.capacity());
        let start = index_from_row_column(i, 0, self.capacity);
        let mut mask = RoaringTreemap::new();
        mask.insert_range(start..start + u64::from(self.capacity));
        let ones_indexes = &self.ones & &mask;
        ones_indexes
            .into_iter()
            .map(move |index| row_column_from_index(index, self.capacity).1)
    }

    pub fn iter_ones_at_column(&self, j: u32) -> impl Iterator<Item = u32> + '_ {
        assert!(j < self.capacity());
        let mask = RoaringTreemap::from_iter(
            (0..self.capacity).map(|k| index_from_row_column(k, j, self.capacity)),
        );
        let ones_indexes = &self.ones & &mask;
        ones_indexes
            .into_iter()
            .map(move |index| row_column_from_index(index, self.capacity).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_test_3x3_matrix() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(3);
        assert_eq!(matrix.get(0, 1), None);
        let ones: Vec<(u32, u32, Weight)> = matrix.iter_ones().collect();
        assert_eq!(ones, vec![]);

        assert_eq!(matrix.insert(0, 1, 7), None);
        assert_eq!(matrix.insert(0, 1, 9), Some(7));
        let ones: Vec<(u32, u32, Weight)> = matrix.iter_ones().collect();
        assert_eq!(ones, vec![(0, 1, 9)]);
        assert_eq!(matrix.edge_count(), 1);
    }

    #[test]
    #[should_panic = "assertion failed: i < self.capacity"]
    fn out_of_range_row() {
        let matrix = WeightedAdjacencyMatrix::with_capacity(2);
        matrix.contains(2, 0);
    }

    #[test]
    fn ones_at_row() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(3);
        matrix.insert(0, 1, 1);
        matrix.insert(0, 0, 1);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_row(0)), vec![0, 1]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_row(1)), vec![]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_row(2)), vec![]);
    }

    #[test]
    fn ones_at_row_of_wide_matrix() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(70_000);
        matrix.insert(69_999, 0, 1);
        matrix.insert(1, 69_999, 1);
        matrix.insert(1, 3, 1);
        matrix.insert(2, 0, 1);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_row(0)), vec![]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_row(1)), vec![3, 69_999]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_row(69_999)), vec![0]);
    }

    #[test]
    fn ones_at_column() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(5);
        matrix.insert(1, 2, 1);
        matrix.insert(4, 2, 1);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_column(0)), vec![]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_column(1)), vec![]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_column(2)), vec![1, 4]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_column(3)), vec![]);
        assert_eq!(Vec::from_iter(matrix.iter_ones_at_column(4)), vec![]);
    }

    #[test]
    fn clearing_row_and_column_counts_diagonal_once() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(3);
        matrix.insert(1, 0, 1);
        matrix.insert(1, 1, 1);
        matrix.insert(1, 2, 1);
        matrix.insert(0, 1, 1);
        matrix.insert(2, 1, 1);
        matrix.insert(0, 2, 5);
        assert_eq!(matrix.clear_row_and_column(1), 5);
        let ones: Vec<(u32, u32, Weight)> = matrix.iter_ones().collect();
        assert_eq!(ones, vec![(0, 2, 5)]);
    }

    #[test]
    fn growing_preserves_cells() {
        cov_mark::check!(adjacency_matrix_grows);
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(2);
        matrix.insert(0, 1, 3);
        matrix.insert(1, 0, 4);
        matrix.insert(1, 1, 5);
        matrix.grow(4);
        assert_eq!(matrix.capacity(), 4);
        let ones: Vec<(u32, u32, Weight)> = matrix.iter_ones().collect();
        assert_eq!(ones, vec![(0, 1, 3), (1, 0, 4), (1, 1, 5)]);
        assert_eq!(matrix.get(1, 0), Some(4));
        assert!(!matrix.contains(0, 2));
        matrix.insert(3, 3, 6);
        assert_eq!(matrix.edge_count(), 4);
    }

    #[test]
    fn growing_to_the_same_capacity_is_a_no_op() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(2);
        matrix.insert(0, 1, 3);
        let before = matrix.clone();
        matrix.grow(2);
        assert_eq!(matrix, before);
    }

    #[test]
    fn clearing_keeps_capacity() {
        let mut matrix = WeightedAdjacencyMatrix::with_capacity(4);
        matrix.insert(3, 2, 1);
        matrix.clear();
        assert_eq!(matrix.capacity(), 4);
        assert_eq!(matrix.edge_count(), 0);
        assert!(!matrix.contains(3, 2));
    }
}
