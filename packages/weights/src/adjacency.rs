//! Contiguity neighbour relation between boundary units.

use std::collections::{BTreeMap, VecDeque};

use crime_lisa_spatial::BoundarySet;
use crime_lisa_weights_models::{ConnectivitySummary, Contiguity, NeighborList};
use geo::Relate;

use crate::WeightsError;

/// DE-9IM pattern for boundaries meeting in at least one point.
const QUEEN_PATTERN: &str = "****T****";
/// DE-9IM pattern for boundaries sharing a segment of positive length.
const ROOK_PATTERN: &str = "****1****";

/// Neighbour lists indexed by unit position.
///
/// Every list is sorted, free of duplicates, and never contains its own
/// index. Units without neighbours have an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    neighbors: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Computes first-order contiguity between the units of a boundary set.
    ///
    /// Only pairs whose bounding boxes intersect are tested; each unordered
    /// pair is related once and recorded in both directions.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::InvalidParameter`] if the DE-9IM pattern is
    /// rejected by the relate engine.
    pub fn from_boundaries(
        boundaries: &BoundarySet,
        rule: Contiguity,
    ) -> Result<Self, WeightsError> {
        let pattern = match rule {
            Contiguity::Queen => QUEEN_PATTERN,
            Contiguity::Rook => ROOK_PATTERN,
        };

        let mut neighbors = vec![Vec::new(); boundaries.len()];
        let mut tested = 0usize;

        for i in 0..boundaries.len() {
            let geometry = &boundaries.unit(i).geometry;

            for j in boundaries.candidate_neighbors(i) {
                if j <= i {
                    continue;
                }
                tested += 1;

                let matrix = geometry.relate(&boundaries.unit(j).geometry);
                let touching = matrix.is_touches()
                    && matrix
                        .matches(pattern)
                        .map_err(|e| WeightsError::InvalidParameter {
                            message: e.to_string(),
                        })?;

                if touching {
                    neighbors[i].push(j);
                    neighbors[j].push(i);
                }
            }
        }

        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        let adjacency = Self { neighbors };
        log::debug!(
            "{rule} contiguity: related {tested} candidate pairs, found {} neighbour pairs",
            adjacency.pair_count()
        );

        Ok(adjacency)
    }

    /// Builds a relation from explicit neighbour lists.
    ///
    /// Lists are sorted and deduplicated; the relation is not forced to be
    /// symmetric.
    ///
    /// # Errors
    ///
    /// * [`WeightsError::InputMismatch`] if an index is out of range
    /// * [`WeightsError::InvalidParameter`] if a unit lists itself
    pub fn from_neighbors(mut lists: Vec<Vec<usize>>) -> Result<Self, WeightsError> {
        let n = lists.len();

        for (i, list) in lists.iter_mut().enumerate() {
            if let Some(&bad) = list.iter().find(|&&j| j >= n) {
                return Err(WeightsError::InputMismatch {
                    message: format!("unit {i} lists neighbour {bad} but there are {n} units"),
                });
            }
            if list.contains(&i) {
                return Err(WeightsError::InvalidParameter {
                    message: format!("unit {i} lists itself as a neighbour"),
                });
            }
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self { neighbors: lists })
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Returns `true` if the relation has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Sorted neighbours of unit `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Number of neighbours of unit `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn degree(&self, i: usize) -> usize {
        self.neighbors[i].len()
    }

    /// Returns `true` if `j` is a neighbour of `i`.
    #[must_use]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.neighbors
            .get(i)
            .is_some_and(|list| list.binary_search(&j).is_ok())
    }

    /// Indices of units without neighbours.
    #[must_use]
    pub fn islands(&self) -> Vec<usize> {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(_, list)| list.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Total number of directed links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum()
    }

    /// Number of unordered pairs `{i, j}` linked in at least one direction.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.neighbors
            .iter()
            .enumerate()
            .flat_map(|(i, list)| list.iter().map(move |&j| (i, j)))
            .filter(|&(i, j)| i < j || !self.contains(j, i))
            .count()
    }

    /// Average number of neighbours per unit (zero for an empty relation).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_degree(&self) -> f64 {
        if self.neighbors.is_empty() {
            return 0.0;
        }
        self.link_count() as f64 / self.neighbors.len() as f64
    }

    /// Returns `true` if every link is reciprocated.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.neighbors
            .iter()
            .enumerate()
            .all(|(i, list)| list.iter().all(|&j| self.contains(j, i)))
    }

    /// Lifts the relation to order `k`.
    ///
    /// The neighbours of `i` at order `k` are the units whose shortest path
    /// from `i` in this relation has exactly `k` steps. Order 1 returns a
    /// copy.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::InvalidParameter`] if `k` is zero.
    pub fn higher_order(&self, k: usize) -> Result<Self, WeightsError> {
        if k == 0 {
            return Err(WeightsError::InvalidParameter {
                message: "neighbour order must be at least 1".to_string(),
            });
        }
        if k == 1 {
            return Ok(self.clone());
        }

        let n = self.neighbors.len();
        let mut lifted = Vec::with_capacity(n);
        let mut distance = vec![usize::MAX; n];
        let mut queue = VecDeque::new();

        for start in 0..n {
            distance.fill(usize::MAX);
            distance[start] = 0;
            queue.clear();
            queue.push_back(start);

            let mut ring = Vec::new();
            while let Some(u) = queue.pop_front() {
                let d = distance[u];
                if d == k {
                    ring.push(u);
                    continue;
                }
                for &v in &self.neighbors[u] {
                    if distance[v] == usize::MAX {
                        distance[v] = d + 1;
                        queue.push_back(v);
                    }
                }
            }

            ring.sort_unstable();
            lifted.push(ring);
        }

        Ok(Self { neighbors: lifted })
    }

    /// Maps the relation onto unit identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::InputMismatch`] if the boundary set has a
    /// different number of units.
    pub fn to_neighbor_list(&self, boundaries: &BoundarySet) -> Result<NeighborList, WeightsError> {
        self.check_len(boundaries)?;

        let list: BTreeMap<String, Vec<String>> = self
            .neighbors
            .iter()
            .enumerate()
            .map(|(i, list)| {
                let mut ids: Vec<String> = list
                    .iter()
                    .map(|&j| boundaries.unit(j).id.clone())
                    .collect();
                ids.sort();
                (boundaries.unit(i).id.clone(), ids)
            })
            .collect();

        Ok(NeighborList(list))
    }

    /// Degree statistics, with islands named by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::InputMismatch`] if the boundary set has a
    /// different number of units.
    pub fn summary(&self, boundaries: &BoundarySet) -> Result<ConnectivitySummary, WeightsError> {
        self.check_len(boundaries)?;

        Ok(ConnectivitySummary {
            units: self.len(),
            links: self.link_count(),
            min_degree: self.neighbors.iter().map(Vec::len).min().unwrap_or(0),
            max_degree: self.neighbors.iter().map(Vec::len).max().unwrap_or(0),
            mean_degree: self.mean_degree(),
            islands: self
                .islands()
                .into_iter()
                .map(|i| boundaries.unit(i).id.clone())
                .collect(),
        })
    }

    fn check_len(&self, boundaries: &BoundarySet) -> Result<(), WeightsError> {
        if self.len() == boundaries.len() {
            Ok(())
        } else {
            Err(WeightsError::InputMismatch {
                message: format!(
                    "adjacency has {} units but the boundary set has {}",
                    self.len(),
                    boundaries.len()
                ),
            })
        }
    }
}

/// Builds contiguity of the given order from a boundary set.
///
/// Islands are logged as a warning since they have no lag under
/// row-standardization.
///
/// # Errors
///
/// Returns [`WeightsError::InvalidParameter`] if `order` is zero.
pub fn build_adjacency(
    boundaries: &BoundarySet,
    rule: Contiguity,
    order: usize,
) -> Result<Adjacency, WeightsError> {
    if order == 0 {
        return Err(WeightsError::InvalidParameter {
            message: "neighbour order must be at least 1".to_string(),
        });
    }

    let adjacency = Adjacency::from_boundaries(boundaries, rule)?.higher_order(order)?;

    log::info!(
        "Built order-{order} {rule} contiguity for {} units (mean degree {:.2})",
        adjacency.len(),
        adjacency.mean_degree()
    );

    let islands = adjacency.islands();
    if !islands.is_empty() {
        let ids: Vec<&str> = islands
            .iter()
            .map(|&i| boundaries.unit(i).id.as_str())
            .collect();
        log::warn!("{} units have no neighbours: {}", ids.len(), ids.join(", "));
    }

    Ok(adjacency)
}
