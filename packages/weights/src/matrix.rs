//! Sparse spatial weight matrices.
//!
//! Rows are stored as sorted `(column, weight)` pairs. A row is *undefined*
//! when the weighting style has no value for it (an island under
//! row-standardization with [`IslandPolicy::Exclude`]); undefined rows
//! carry no weight and refuse to produce a spatial lag.

use crime_lisa_weights_models::{IslandPolicy, WeightStyle};

use crate::{Adjacency, WeightsError};

/// Weight matrix derived from an [`Adjacency`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialWeights {
    style: WeightStyle,
    rows: Vec<Option<Vec<(usize, f64)>>>,
}

impl SpatialWeights {
    /// Builds weights, rejecting islands where the style cannot define a
    /// row.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::DegenerateInput`] listing the islands when
    /// `style` is [`WeightStyle::RowStandardized`] and some unit has no
    /// neighbours.
    pub fn new(adjacency: &Adjacency, style: WeightStyle) -> Result<Self, WeightsError> {
        Self::with_island_policy(adjacency, style, IslandPolicy::Reject)
    }

    /// Builds weights with an explicit policy for rows the style cannot
    /// define.
    ///
    /// Binary weights define every row (an island has an all-zero row), so
    /// the policy only matters for row-standardization.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::DegenerateInput`] under
    /// [`IslandPolicy::Reject`] when a row-standardized island exists.
    pub fn with_island_policy(
        adjacency: &Adjacency,
        style: WeightStyle,
        policy: IslandPolicy,
    ) -> Result<Self, WeightsError> {
        let islands = adjacency.islands();

        if style == WeightStyle::RowStandardized && !islands.is_empty() {
            match policy {
                IslandPolicy::Reject => {
                    let listed: Vec<String> = islands.iter().map(ToString::to_string).collect();
                    return Err(WeightsError::DegenerateInput {
                        message: format!(
                            "row-standardized weights are undefined for units without neighbours: [{}]",
                            listed.join(", ")
                        ),
                    });
                }
                IslandPolicy::Exclude => {
                    log::warn!(
                        "Excluding {} units without neighbours from row-standardized weights",
                        islands.len()
                    );
                }
            }
        }

        let rows = (0..adjacency.len())
            .map(|i| {
                let neighbors = adjacency.neighbors(i);
                match style {
                    WeightStyle::Binary => Some(neighbors.iter().map(|&j| (j, 1.0)).collect()),
                    WeightStyle::RowStandardized if neighbors.is_empty() => None,
                    WeightStyle::RowStandardized => {
                        #[allow(clippy::cast_precision_loss)]
                        let w = 1.0 / neighbors.len() as f64;
                        Some(neighbors.iter().map(|&j| (j, w)).collect())
                    }
                }
            })
            .collect();

        Ok(Self { style, rows })
    }

    /// Number of rows (units).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the matrix has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Weighting style used to build the matrix.
    #[must_use]
    pub const fn style(&self) -> WeightStyle {
        self.style
    }

    /// Non-zero entries of row `i`, or `None` if the row is undefined or out
    /// of range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[(usize, f64)]> {
        self.rows.get(i).and_then(|row| row.as_deref())
    }

    /// Returns `true` if row `i` exists and is defined.
    #[must_use]
    pub fn is_defined(&self, i: usize) -> bool {
        self.row(i).is_some()
    }

    /// Indices of undefined rows.
    #[must_use]
    pub fn undefined_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of non-zero entries in row `i` (zero for undefined rows).
    #[must_use]
    pub fn degree(&self, i: usize) -> usize {
        self.row(i).map_or(0, <[_]>::len)
    }

    /// `w(i, j)`; zero off the neighbour relation, on the diagonal, and in
    /// undefined rows.
    #[must_use]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.row(i)
            .and_then(|row| {
                row.binary_search_by_key(&j, |&(col, _)| col)
                    .ok()
                    .map(|pos| row[pos].1)
            })
            .unwrap_or(0.0)
    }

    /// Sum of row `i`, `w_i`.
    #[must_use]
    pub fn row_sum(&self, i: usize) -> f64 {
        self.row(i).map_or(0.0, |row| row.iter().map(|&(_, w)| w).sum())
    }

    /// Sum of squared weights in row `i`, `w_i(2)`.
    #[must_use]
    pub fn row_sum_of_squares(&self, i: usize) -> f64 {
        self.row(i)
            .map_or(0.0, |row| row.iter().map(|&(_, w)| w * w).sum())
    }

    /// `S0`, the sum of all weights.
    #[must_use]
    pub fn s0(&self) -> f64 {
        (0..self.len()).map(|i| self.row_sum(i)).sum()
    }

    /// `S1 = ½ Σᵢ Σⱼ (w(i,j) + w(j,i))²`.
    ///
    /// Expanded as `Σ w(i,j)² + Σ w(i,j)·w(j,i)` so only stored entries are
    /// visited.
    #[must_use]
    pub fn s1(&self) -> f64 {
        let mut squares = 0.0;
        let mut cross = 0.0;
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, w) in row.as_deref().unwrap_or_default() {
                squares += w * w;
                cross += w * self.weight(j, i);
            }
        }
        squares + cross
    }

    /// `S2 = Σᵢ (w_i. + w_.i)²`, with row sums `w_i.` and column sums `w_.i`.
    #[must_use]
    pub fn s2(&self) -> f64 {
        let mut column_sums = vec![0.0; self.len()];
        for row in self.rows.iter().flatten() {
            for &(j, w) in row {
                column_sums[j] += w;
            }
        }

        column_sums
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let total = self.row_sum(i) + col;
                total * total
            })
            .sum()
    }

    /// Spatial lag of unit `i`: `Σⱼ w(i,j)·values[j]`.
    ///
    /// Returns `None` for an undefined row. Panics if `values` is shorter
    /// than the highest neighbour index.
    #[must_use]
    pub fn row_lag(&self, i: usize, values: &[f64]) -> Option<f64> {
        self.row(i)
            .map(|row| row.iter().map(|&(j, w)| w * values[j]).sum())
    }

    /// Spatial lag of every unit.
    ///
    /// Under row-standardization this is the mean of the neighbours' values;
    /// under binary weights it is their sum (zero for an island).
    ///
    /// # Errors
    ///
    /// * [`WeightsError::InputMismatch`] if `values` does not have one entry
    ///   per row
    /// * [`WeightsError::DegenerateInput`] if any row is undefined
    pub fn spatial_lag(&self, values: &[f64]) -> Result<Vec<f64>, WeightsError> {
        if values.len() != self.len() {
            return Err(WeightsError::InputMismatch {
                message: format!(
                    "{} values supplied for {} weight rows",
                    values.len(),
                    self.len()
                ),
            });
        }

        let undefined = self.undefined_rows();
        if !undefined.is_empty() {
            let listed: Vec<String> = undefined.iter().map(ToString::to_string).collect();
            return Err(WeightsError::DegenerateInput {
                message: format!(
                    "spatial lag is undefined for units without neighbours: [{}]",
                    listed.join(", ")
                ),
            });
        }

        Ok((0..self.len())
            .filter_map(|i| self.row_lag(i, values))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{grid_2x2, grid_3x3};
    use crime_lisa_weights_models::Contiguity;

    const EPS: f64 = 1e-12;

    fn rook_2x2() -> Adjacency {
        Adjacency::from_boundaries(&grid_2x2(), Contiguity::Rook).unwrap()
    }

    #[test]
    fn row_standardized_weights_are_half_on_2x2_rook() {
        let w = SpatialWeights::new(&rook_2x2(), WeightStyle::RowStandardized).unwrap();
        assert!((w.weight(0, 1) - 0.5).abs() < EPS);
        assert!((w.weight(0, 2) - 0.5).abs() < EPS);
        assert!(w.weight(0, 3).abs() < EPS);
        assert!(w.weight(0, 0).abs() < EPS, "diagonal must be zero");
    }

    #[test]
    fn row_standardized_rows_sum_to_one() {
        let adj = Adjacency::from_boundaries(&grid_3x3(), Contiguity::Queen).unwrap();
        let w = SpatialWeights::new(&adj, WeightStyle::RowStandardized).unwrap();
        for i in 0..w.len() {
            assert!(
                (w.row_sum(i) - 1.0).abs() < EPS,
                "row {i} sums to {}",
                w.row_sum(i)
            );
        }
        assert!((w.s0() - 9.0).abs() < EPS);
    }

    #[test]
    fn island_rejected_under_row_standardization() {
        let adj = Adjacency::from_neighbors(vec![vec![1], vec![0], vec![]]).unwrap();
        let err = SpatialWeights::new(&adj, WeightStyle::RowStandardized).unwrap_err();
        match err {
            WeightsError::DegenerateInput { message } => {
                assert!(message.contains("[2]"), "message: {message}");
            }
            other => panic!("expected DegenerateInput, got {other:?}"),
        }
    }

    #[test]
    fn island_excluded_when_requested() {
        let adj = Adjacency::from_neighbors(vec![vec![1], vec![0], vec![]]).unwrap();
        let w = SpatialWeights::with_island_policy(
            &adj,
            WeightStyle::RowStandardized,
            IslandPolicy::Exclude,
        )
        .unwrap();

        assert_eq!(w.undefined_rows(), vec![2]);
        assert_eq!(w.row_lag(2, &[1.0, 2.0, 3.0]), None);
        assert_eq!(w.row_lag(0, &[1.0, 2.0, 3.0]), Some(2.0));
        assert!(matches!(
            w.spatial_lag(&[1.0, 2.0, 3.0]),
            Err(WeightsError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn binary_island_has_zero_lag() {
        let adj = Adjacency::from_neighbors(vec![vec![1], vec![0], vec![]]).unwrap();
        let w = SpatialWeights::new(&adj, WeightStyle::Binary).unwrap();
        let lag = w.spatial_lag(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(lag, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn lag_is_neighbour_mean_under_row_standardization() {
        let w = SpatialWeights::new(&rook_2x2(), WeightStyle::RowStandardized).unwrap();
        let lag = w.spatial_lag(&[10.0, 10.0, 1.0, 1.0]).unwrap();
        assert_eq!(lag, vec![5.5, 5.5, 5.5, 5.5]);
    }

    #[test]
    fn lag_length_mismatch_is_an_error() {
        let w = SpatialWeights::new(&rook_2x2(), WeightStyle::Binary).unwrap();
        assert!(matches!(
            w.spatial_lag(&[1.0, 2.0]),
            Err(WeightsError::InputMismatch { .. })
        ));
    }

    #[test]
    fn sums_on_symmetric_binary_weights() {
        // 2x2 rook binary: 8 links, each row sum 2.
        let w = SpatialWeights::new(&rook_2x2(), WeightStyle::Binary).unwrap();
        assert!((w.s0() - 8.0).abs() < EPS);
        // Symmetric binary: S1 = 2 * S0.
        assert!((w.s1() - 16.0).abs() < EPS);
        // (2 + 2)^2 per unit.
        assert!((w.s2() - 64.0).abs() < EPS);
        assert!((w.row_sum_of_squares(0) - 2.0).abs() < EPS);
    }

    #[test]
    fn s1_handles_asymmetric_rows() {
        // Row-standardized 1-2-3 path: w(0,1)=1, w(1,0)=w(1,2)=0.5, w(2,1)=1.
        let adj = Adjacency::from_neighbors(vec![vec![1], vec![0, 2], vec![1]]).unwrap();
        let w = SpatialWeights::new(&adj, WeightStyle::RowStandardized).unwrap();
        // ½ Σ (w_ij + w_ji)^2 = ½ * 2 * (1.5^2 + 1.5^2) = 4.5
        assert!((w.s1() - 4.5).abs() < EPS);
        // Row sums 1,1,1; column sums 0.5,2,0.5 → 1.5^2 + 3^2 + 1.5^2 = 13.5
        assert!((w.s2() - 13.5).abs() < EPS);
    }
}
