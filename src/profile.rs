//! Load profiles, the EV profile pool, and their alignment against a grid.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::ProfileError;
use crate::grid::{Grid, Id};

/// Time-indexed power values per load.
///
/// `values[t][i]` is the power of `load_ids[i]` at `timestamps[t]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    timestamps: Vec<NaiveDateTime>,
    load_ids: Vec<Id>,
    values: Vec<Vec<f64>>,
}

impl LoadProfile {
    /// Creates a profile, checking that the matrix matches both axes.
    ///
    /// # Errors
    ///
    /// Returns `Shape` or `RowWidth` when the value matrix has the wrong size.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        load_ids: Vec<Id>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, ProfileError> {
        if values.len() != timestamps.len() {
            return Err(ProfileError::Shape {
                profile: "load",
                timestamps: timestamps.len(),
                rows: values.len(),
            });
        }
        if let Some((row, r)) = values
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != load_ids.len())
        {
            return Err(ProfileError::RowWidth {
                profile: "load",
                row,
                expected: load_ids.len(),
                actual: r.len(),
            });
        }
        Ok(Self {
            timestamps,
            load_ids,
            values,
        })
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn load_ids(&self) -> &[Id] {
        &self.load_ids
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }
}

/// One EV charging curve.
#[derive(Debug, Clone, PartialEq)]
pub struct EvCurve {
    /// Active power per timestamp (W).
    pub p: Vec<f64>,
    /// Reactive power per timestamp (var); `None` leaves reactive power untouched.
    pub q: Option<Vec<f64>>,
}

impl EvCurve {
    pub fn active(p: Vec<f64>) -> Self {
        Self { p, q: None }
    }
}

/// Candidate EV curves, each usable at most once per analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvProfilePool {
    curves: Vec<EvCurve>,
}

impl EvProfilePool {
    pub fn new(curves: Vec<EvCurve>) -> Self {
        Self { curves }
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn curves(&self) -> &[EvCurve] {
        &self.curves
    }
}

/// Profiles that passed alignment, with columns in grid sym_load order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedProfiles {
    timestamps: Vec<NaiveDateTime>,
    load_ids: Vec<Id>,
    p: Vec<Vec<f64>>,
    q: Vec<Vec<f64>>,
    ev_pool: Option<EvProfilePool>,
}

/// Load injection of one timestamp, as handed to the solver.
#[derive(Debug, Clone, Copy)]
pub struct LoadInjection<'a> {
    pub timestamp: NaiveDateTime,
    pub load_ids: &'a [Id],
    /// Active power per load (W).
    pub p: &'a [f64],
    /// Reactive power per load (var).
    pub q: &'a [f64],
}

impl AlignedProfiles {
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn load_ids(&self) -> &[Id] {
        &self.load_ids
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn active_power(&self) -> &[Vec<f64>] {
        &self.p
    }

    pub fn reactive_power(&self) -> &[Vec<f64>] {
        &self.q
    }

    pub fn ev_pool(&self) -> Option<&EvProfilePool> {
        self.ev_pool.as_ref()
    }

    /// Load injection at timestamp index `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t >= self.len()`.
    pub fn injection(&self, t: usize) -> LoadInjection<'_> {
        LoadInjection {
            timestamp: self.timestamps[t],
            load_ids: &self.load_ids,
            p: &self.p[t],
            q: &self.q[t],
        }
    }

    /// Copy with `curve` added on top of the load in column `col`.
    pub(crate) fn with_added_curve(mut self, col: usize, curve: &EvCurve) -> Self {
        for (row, extra) in self.p.iter_mut().zip(&curve.p) {
            row[col] += extra;
        }
        if let Some(q) = &curve.q {
            for (row, extra) in self.q.iter_mut().zip(q) {
                row[col] += extra;
            }
        }
        self
    }
}

/// Validates active/reactive profiles (and an optional EV pool) against the grid.
///
/// Load ids are compared as sets and columns are reordered to the grid's
/// sym_load order. Timestamps are never reordered, filled, or interpolated:
/// any difference is an error.
///
/// # Errors
///
/// Returns the first [`ProfileError`] in check order: load ids, emptiness,
/// timestamp agreement, monotonicity, EV pool size, EV curve length.
pub fn align(
    grid: &Grid,
    p_profile: &LoadProfile,
    q_profile: &LoadProfile,
    ev_pool: Option<EvProfilePool>,
) -> Result<AlignedProfiles, ProfileError> {
    let expected: BTreeSet<Id> = grid.sym_loads().iter().map(|l| l.id).collect();
    check_ids("active", p_profile, &expected)?;
    check_ids("reactive", q_profile, &expected)?;

    if p_profile.timestamps.is_empty() {
        return Err(ProfileError::Empty { profile: "active" });
    }
    if q_profile.timestamps.is_empty() {
        return Err(ProfileError::Empty {
            profile: "reactive",
        });
    }
    if p_profile.timestamps.len() != q_profile.timestamps.len() {
        return Err(ProfileError::TimestampLengthMismatch {
            active: p_profile.timestamps.len(),
            reactive: q_profile.timestamps.len(),
        });
    }
    if let Some((index, (a, r))) = p_profile
        .timestamps
        .iter()
        .zip(&q_profile.timestamps)
        .enumerate()
        .find(|(_, (a, r))| a != r)
    {
        return Err(ProfileError::TimestampMismatch {
            index,
            active: *a,
            reactive: *r,
        });
    }
    if let Some(index) = p_profile
        .timestamps
        .windows(2)
        .position(|w| w[1] <= w[0])
    {
        return Err(ProfileError::NonMonotonicTimestamps { index: index + 1 });
    }

    let n_loads = grid.sym_loads().len();
    if let Some(pool) = &ev_pool {
        if pool.len() < n_loads {
            return Err(ProfileError::InsufficientEvProfiles {
                available: pool.len(),
                required: n_loads,
            });
        }
        let horizon = p_profile.timestamps.len();
        for (curve, c) in pool.curves.iter().enumerate() {
            let q_len = c.q.as_ref().map_or(horizon, Vec::len);
            if c.p.len() != horizon || q_len != horizon {
                return Err(ProfileError::EvCurveLength {
                    curve,
                    expected: horizon,
                    actual: if c.p.len() != horizon { c.p.len() } else { q_len },
                });
            }
        }
    }

    let load_ids: Vec<Id> = grid.sym_loads().iter().map(|l| l.id).collect();
    let p = reorder_columns(p_profile, &load_ids);
    let q = reorder_columns(q_profile, &load_ids);

    debug!(
        timestamps = p.len(),
        loads = load_ids.len(),
        ev_pool = ev_pool.as_ref().map_or(0, EvProfilePool::len),
        "profiles aligned"
    );
    Ok(AlignedProfiles {
        timestamps: p_profile.timestamps.clone(),
        load_ids,
        p,
        q,
        ev_pool,
    })
}

fn check_ids(
    profile: &'static str,
    data: &LoadProfile,
    expected: &BTreeSet<Id>,
) -> Result<(), ProfileError> {
    let actual: BTreeSet<Id> = data.load_ids.iter().copied().collect();
    // A repeated column would make the sets equal while the widths differ.
    if actual == *expected && actual.len() == data.load_ids.len() {
        return Ok(());
    }
    let mut unexpected: Vec<Id> = actual.difference(expected).copied().collect();
    if actual.len() != data.load_ids.len() {
        let mut seen = BTreeSet::new();
        unexpected.extend(data.load_ids.iter().filter(|id| !seen.insert(**id)));
    }
    Err(ProfileError::LoadIdMismatch {
        profile,
        missing: expected.difference(&actual).copied().collect(),
        unexpected,
    })
}

fn reorder_columns(data: &LoadProfile, order: &[Id]) -> Vec<Vec<f64>> {
    let col_of: HashMap<Id, usize> = data
        .load_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();
    let cols: Vec<usize> = order.iter().map(|id| col_of[id]).collect();
    data.values
        .iter()
        .map(|row| cols.iter().map(|&c| row[c]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::types::{GridInput, Line, Node, Source, SymLoad, TapSetting, Transformer};
    use chrono::{Duration, NaiveDate};

    fn grid() -> Grid {
        let input = GridInput {
            nodes: (0..3)
                .map(|id| Node {
                    id,
                    u_rated: 400.0,
                })
                .collect(),
            lines: vec![Line {
                id: 11,
                from_node: 1,
                to_node: 2,
                in_service: true,
            }],
            sources: vec![Source { id: 20, node: 0 }],
            transformers: vec![Transformer {
                id: 10,
                from_node: 0,
                to_node: 1,
                tap_pos: 0,
                taps: vec![TapSetting {
                    position: 0,
                    ratio: 1.0,
                }],
            }],
            sym_loads: vec![SymLoad { id: 30, node: 1 }, SymLoad { id: 31, node: 2 }],
        };
        Grid::build(input).expect("fixture grid should be valid")
    }

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|h| start + Duration::hours(h as i64)).collect()
    }

    fn profile(ids: Vec<Id>, timestamps: Vec<NaiveDateTime>) -> LoadProfile {
        let values = timestamps
            .iter()
            .enumerate()
            .map(|(t, _)| ids.iter().map(|&id| id as f64 * 10.0 + t as f64).collect())
            .collect();
        LoadProfile::new(timestamps, ids, values).unwrap()
    }

    #[test]
    fn shape_checked_on_construction() {
        let err = LoadProfile::new(hours(2), vec![30], vec![vec![1.0]]).err();
        assert!(matches!(err, Some(ProfileError::Shape { rows: 1, .. })));

        let err = LoadProfile::new(hours(1), vec![30, 31], vec![vec![1.0]]).err();
        assert!(matches!(err, Some(ProfileError::RowWidth { row: 0, .. })));
    }

    #[test]
    fn columns_follow_grid_order() {
        let g = grid();
        let p = profile(vec![31, 30], hours(3));
        let q = profile(vec![30, 31], hours(3));
        let aligned = align(&g, &p, &q, None).expect("profiles should align");
        assert_eq!(aligned.load_ids(), &[30, 31]);
        // row t = [300 + t, 310 + t] regardless of input column order
        assert_eq!(aligned.active_power()[2], vec![302.0, 312.0]);
        assert_eq!(aligned.injection(1).p, &[301.0, 311.0]);
    }

    #[test]
    fn one_missing_id_rejected() {
        let g = grid();
        let p = profile(vec![30], hours(2));
        let q = profile(vec![30, 31], hours(2));
        assert_eq!(
            align(&g, &p, &q, None).err(),
            Some(ProfileError::LoadIdMismatch {
                profile: "active",
                missing: vec![31],
                unexpected: vec![],
            })
        );
    }

    #[test]
    fn one_extra_id_rejected() {
        let g = grid();
        let p = profile(vec![30, 31], hours(2));
        let q = profile(vec![30, 31, 32], hours(2));
        assert_eq!(
            align(&g, &p, &q, None).err(),
            Some(ProfileError::LoadIdMismatch {
                profile: "reactive",
                missing: vec![],
                unexpected: vec![32],
            })
        );
    }

    #[test]
    fn repeated_column_rejected() {
        let g = grid();
        let p = profile(vec![30, 31, 31], hours(2));
        let q = profile(vec![30, 31], hours(2));
        assert!(matches!(
            align(&g, &p, &q, None),
            Err(ProfileError::LoadIdMismatch { profile: "active", .. })
        ));
    }

    #[test]
    fn reordered_timestamps_rejected() {
        let g = grid();
        let ts = hours(3);
        let swapped = vec![ts[1], ts[0], ts[2]];
        let p = profile(vec![30, 31], ts.clone());
        let q = profile(vec![30, 31], swapped);
        assert_eq!(
            align(&g, &p, &q, None).err(),
            Some(ProfileError::TimestampMismatch {
                index: 0,
                active: ts[0],
                reactive: ts[1],
            })
        );
    }

    #[test]
    fn timestamp_length_mismatch_rejected() {
        let g = grid();
        let p = profile(vec![30, 31], hours(3));
        let q = profile(vec![30, 31], hours(2));
        assert_eq!(
            align(&g, &p, &q, None).err(),
            Some(ProfileError::TimestampLengthMismatch {
                active: 3,
                reactive: 2
            })
        );
    }

    #[test]
    fn descending_timestamps_rejected() {
        let g = grid();
        let mut ts = hours(3);
        ts.reverse();
        let p = profile(vec![30, 31], ts.clone());
        let q = profile(vec![30, 31], ts);
        assert_eq!(
            align(&g, &p, &q, None).err(),
            Some(ProfileError::NonMonotonicTimestamps { index: 1 })
        );
    }

    #[test]
    fn empty_profile_rejected() {
        let g = grid();
        let p = profile(vec![30, 31], Vec::new());
        let q = profile(vec![30, 31], Vec::new());
        assert_eq!(
            align(&g, &p, &q, None).err(),
            Some(ProfileError::Empty { profile: "active" })
        );
    }

    #[test]
    fn small_ev_pool_rejected() {
        let g = grid();
        let p = profile(vec![30, 31], hours(2));
        let q = profile(vec![30, 31], hours(2));
        let pool = EvProfilePool::new(vec![EvCurve::active(vec![1.0, 1.0])]);
        assert_eq!(
            align(&g, &p, &q, Some(pool)).err(),
            Some(ProfileError::InsufficientEvProfiles {
                available: 1,
                required: 2
            })
        );
    }

    #[test]
    fn short_ev_curve_rejected() {
        let g = grid();
        let p = profile(vec![30, 31], hours(2));
        let q = profile(vec![30, 31], hours(2));
        let pool = EvProfilePool::new(vec![
            EvCurve::active(vec![1.0, 1.0]),
            EvCurve::active(vec![1.0]),
        ]);
        assert_eq!(
            align(&g, &p, &q, Some(pool)).err(),
            Some(ProfileError::EvCurveLength {
                curve: 1,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn added_curve_touches_one_column() {
        let g = grid();
        let p = profile(vec![30, 31], hours(2));
        let q = profile(vec![30, 31], hours(2));
        let aligned = align(&g, &p, &q, None).unwrap();
        let curve = EvCurve {
            p: vec![5.0, 6.0],
            q: Some(vec![1.0, 1.0]),
        };
        let updated = aligned.with_added_curve(1, &curve);
        assert_eq!(
            updated.active_power(),
            &[vec![300.0, 315.0], vec![301.0, 317.0]]
        );
        assert_eq!(updated.reactive_power()[0], vec![300.0, 311.0]);
    }
}
