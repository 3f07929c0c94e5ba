//! Top-down reconstruction of per-machine configurations.
//!
//! Each pending target `(vector, count)` is split into two halves whose
//! table values add up to `count`, walking from fine to coarse tables until
//! only single configurations remain.

use crate::table::ConfigurationTable;
use crate::vector::ProfileVector;
use crate::{log_detail, log_error, log_progress};

use super::core::{EngineError, SchedulingEngine};
use super::levels::Level;

/// A vector still to be decomposed into `count` machine groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub vector: ProfileVector,
    pub count: u32,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x{}", self.vector, self.count)
    }
}

/// Minimum of `table[a] + table[profile - a]` over every known `a`.
pub(crate) fn best_split_value(table: &ConfigurationTable, profile: &ProfileVector) -> Option<u32> {
    let window = table.window();
    let mut half = ProfileVector::zeros(profile.dim());
    let mut other = ProfileVector::zeros(profile.dim());
    let mut best: Option<u32> = None;
    for (idx, v1) in table.known() {
        window.from_index(idx, &mut half);
        half += table.anchor();
        other.copy_from(profile);
        other -= &half;
        other -= table.anchor();
        let Some(v2) = window.try_index(&other).and_then(|k| table.get_index(k)) else {
            continue;
        };
        if best.map_or(true, |b| v1 + v2 < b) {
            best = Some(v1 + v2);
        }
    }
    best
}

/// Most balanced split of `target` against `table`.
///
/// Candidates are scanned in ascending index order and the first one with
/// the smallest `|v1 - v2|` wins. A zero first half is never taken. A zero
/// second half only carries the target down unchanged, so it is allowed
/// only while `carry` is set.
pub(crate) fn find_split(
    table: &ConfigurationTable,
    target: &Target,
    carry: bool,
) -> Option<(Target, Target)> {
    let window = table.window();
    let anchor = table.anchor();
    let mut first = ProfileVector::zeros(target.vector.dim());
    let mut second = ProfileVector::zeros(target.vector.dim());
    let mut best: Option<(usize, u32, u32, u32)> = None;

    for (idx, v1) in table.known() {
        if v1 > target.count {
            continue;
        }
        window.from_index(idx, &mut first);
        first += anchor;
        if first.is_zero() {
            continue;
        }
        second.copy_from(&target.vector);
        second -= &first;
        if !carry && second.is_zero() {
            continue;
        }
        second -= anchor;
        let Some(v2) = window.try_index(&second).and_then(|k| table.get_index(k)) else {
            continue;
        };
        if v1 + v2 != target.count {
            continue;
        }
        let diff = v1.abs_diff(v2);
        if best.map_or(true, |(_, _, _, d)| diff < d) {
            best = Some((idx, v1, v2, diff));
            if diff <= 1 {
                break;
            }
        }
    }

    best.map(|(idx, v1, v2, _)| {
        let mut first = window.vector_at(idx);
        first += anchor;
        let second = &target.vector - &first;
        (
            Target {
                vector: first,
                count: v1,
            },
            Target {
                vector: second,
                count: v2,
            },
        )
    })
}

/// Reconstruction state: the current level plus the work lists.
pub(crate) struct Backtrace<'e> {
    engine: &'e SchedulingEngine,
    depth: usize,
    level: Level,
    pending: Vec<Target>,
    emitted: Vec<ProfileVector>,
    unresolved: Vec<Target>,
}

impl<'e> Backtrace<'e> {
    /// Start from `root`, whose count was read from `level.fine`.
    pub(crate) fn new(engine: &'e SchedulingEngine, level: Level, root: Target) -> Self {
        Self {
            engine,
            depth: 0,
            level,
            pending: vec![root],
            emitted: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Returns the emitted configurations and the targets no table could split.
    pub(crate) fn run(mut self) -> Result<(Vec<ProfileVector>, Vec<Target>), EngineError> {
        loop {
            let fine_fixed = self.level.fine_is_fixed_point(self.engine);
            self.resolve(false, !fine_fixed);
            if self.pending.is_empty() {
                break;
            }
            let fixed = self.level.coarse_is_fixed_point(self.engine);
            self.resolve(true, !fixed);
            if self.pending.is_empty() {
                break;
            }
            if fixed {
                self.drain_fixed_point();
                break;
            }
            let anchor = self.engine.previous_anchor(self.level.coarse.anchor());
            self.level = self.engine.build_level(&anchor)?;
            self.depth += 1;
            log_progress!(
                self.engine.verbosity(),
                "backtrace depth {}: {} pending targets at {}",
                self.depth,
                self.pending.len(),
                anchor
            );
        }
        Ok((self.emitted, self.unresolved))
    }

    /// Keep splitting against the closure until nothing is pending or the pass budget runs out.
    fn drain_fixed_point(&mut self) {
        let mut passes = 1;
        while !self.pending.is_empty() {
            if passes >= self.engine.max_fixed_point_passes() {
                log_error!(
                    self.engine.verbosity(),
                    "Backtrace: {} targets still pending after {} passes on the closure",
                    self.pending.len(),
                    passes
                );
                self.unresolved.append(&mut self.pending);
                return;
            }
            self.resolve(true, false);
            passes += 1;
        }
    }

    /// Split every pending target once, against `coarse` or `fine`.
    fn resolve(&mut self, coarse: bool, carry: bool) {
        let table = if coarse {
            &self.level.coarse
        } else {
            &self.level.fine
        };
        let scheme = self.engine.scheme();
        let verbosity = self.engine.verbosity();
        let mut next = Vec::with_capacity(self.pending.len() * 2);

        for target in self.pending.drain(..) {
            let Some((first, second)) = find_split(table, &target, carry) else {
                log_error!(
                    verbosity,
                    "Backtrace: no split for {} against table at {}",
                    target,
                    table.anchor()
                );
                self.unresolved.push(target);
                continue;
            };
            log_detail!(verbosity, "split {} -> {} + {}", target, first, second);
            for half in [first, second] {
                if half.count <= 1 && half.vector.l1_norm() <= scheme.max_l1_norm() {
                    self.emitted.push(half.vector);
                } else {
                    next.push(half);
                }
            }
        }
        self.pending = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingScheme;
    use crate::table::Window;

    fn pv(values: &[i32]) -> ProfileVector {
        ProfileVector::from_slice(values)
    }

    /// One-bucket table holding `values[k]` at actual `anchor + k`.
    fn line_table(anchor: i32, values: &[Option<u32>]) -> ConfigurationTable {
        let table = ConfigurationTable::new(Window::new(&[values.len()]), pv(&[anchor]));
        for (k, v) in values.iter().enumerate() {
            table.store_index(k, *v);
        }
        table
    }

    #[test]
    fn test_best_split_value() {
        // actual 0..5 -> 0, 1, 1, 2, 2
        let table = line_table(0, &[Some(0), Some(1), Some(1), Some(2), Some(2)]);
        assert_eq!(best_split_value(&table, &pv(&[4])), Some(2));
        assert_eq!(best_split_value(&table, &pv(&[6])), Some(3));
        assert_eq!(best_split_value(&table, &pv(&[9])), None);
    }

    #[test]
    fn test_find_split_prefers_balance() {
        let table = line_table(0, &[Some(0), Some(1), Some(1), Some(2), Some(2), Some(3)]);
        let target = Target {
            vector: pv(&[5]),
            count: 3,
        };
        let (a, b) = find_split(&table, &target, true).unwrap();
        assert_eq!(a.count + b.count, 3);
        assert_eq!(a.count.abs_diff(b.count), 1);
        assert_eq!(&a.vector + &b.vector, pv(&[5]));
    }

    #[test]
    fn test_find_split_carry() {
        // Only actual 0 and 3 are known, so 3 can only be carried.
        let table = line_table(0, &[Some(0), None, None, Some(2)]);
        let target = Target {
            vector: pv(&[3]),
            count: 2,
        };
        let (a, b) = find_split(&table, &target, true).unwrap();
        assert_eq!(a.vector, pv(&[3]));
        assert_eq!(b.vector, pv(&[0]));
        assert_eq!(b.count, 0);

        assert_eq!(find_split(&table, &target, false), None);
    }

    #[test]
    fn test_find_split_respects_count() {
        let table = line_table(0, &[Some(0), Some(1), Some(1), Some(2)]);
        let target = Target {
            vector: pv(&[3]),
            count: 1,
        };
        assert_eq!(find_split(&table, &target, true), None);
    }

    #[test]
    fn test_backtrace_on_worked_example() {
        let scheme = RoundingScheme::uniform(vec![0.6, 0.4, 0.34], 6, 3, 1.0, 0.00001).unwrap();
        let mut config = crate::config::EngineConfig::with_strategy("direct");
        config.worker_cap = 1;
        let engine = SchedulingEngine::new(scheme, &config).unwrap();

        let profile = pv(&[1, 1, 1]);
        let level = engine.build_level(&engine.previous_anchor(&profile)).unwrap();
        let count = best_split_value(&level.fine, &profile).unwrap();
        assert_eq!(count, 2);

        let root = Target {
            vector: profile.clone(),
            count,
        };
        let (emitted, unresolved) = Backtrace::new(&engine, level, root).run().unwrap();
        assert!(unresolved.is_empty());
        let nonzero: Vec<_> = emitted.iter().filter(|v| !v.is_zero()).collect();
        assert_eq!(nonzero.len(), 2);
        assert_eq!(crate::vector::sum_vectors(3, nonzero), profile);
    }

    /// One-bucket engine where every job needs its own machine.
    fn unit_engine(max_fixed_point_passes: usize) -> SchedulingEngine {
        let scheme = RoundingScheme::uniform(vec![0.1], 6, 1, 1.0, 0.0).unwrap();
        let mut config = crate::config::EngineConfig::with_strategy("direct");
        config.worker_cap = 1;
        config.max_fixed_point_passes = max_fixed_point_passes;
        SchedulingEngine::new(scheme, &config).unwrap()
    }

    /// Both tables hold `table`, keyed at the fixed point `-2`.
    fn fixed_level(table: ConfigurationTable) -> Level {
        Level {
            anchor: pv(&[-2]),
            fine: table.clone(),
            coarse: table,
        }
    }

    /// actual 0..=7 -> 0..=7
    fn counting_table() -> ConfigurationTable {
        let mut values = vec![None, None];
        values.extend((0..8).map(Some));
        line_table(-2, &values)
    }

    #[test]
    fn test_fixed_point_drain_completes() {
        let engine = unit_engine(64);
        let root = Target {
            vector: pv(&[7]),
            count: 7,
        };
        let configs = engine.reconstruct(fixed_level(counting_table()), root).unwrap();
        assert_eq!(configs, vec![pv(&[1]); 7]);
    }

    #[test]
    fn test_fixed_point_pass_budget() {
        let engine = unit_engine(1);
        let root = Target {
            vector: pv(&[7]),
            count: 7,
        };
        let (emitted, unresolved) = Backtrace::new(&engine, fixed_level(counting_table()), root.clone())
            .run()
            .unwrap();
        // 7 -> 3 + 4 -> (1 + 2) + (2 + 2); the three 2s are left over.
        assert_eq!(emitted, vec![pv(&[1])]);
        assert_eq!(unresolved.len(), 3);
        assert!(unresolved.iter().all(|t| t.vector == pv(&[2]) && t.count == 2));

        match engine.reconstruct(fixed_level(counting_table()), root) {
            Err(EngineError::IncompleteSchedule { unresolved, partial }) => {
                assert_eq!(unresolved.len(), 3);
                assert_eq!(partial, vec![pv(&[1])]);
            }
            other => panic!("expected an incomplete schedule, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_split_is_reported() {
        let engine = unit_engine(64);
        // No two known halves of 3 add up to a single machine.
        let table = line_table(-2, &[None, None, Some(0), Some(1), Some(1), Some(2)]);
        let root = Target {
            vector: pv(&[3]),
            count: 1,
        };
        let (emitted, unresolved) = Backtrace::new(&engine, fixed_level(table.clone()), root.clone())
            .run()
            .unwrap();
        assert!(emitted.is_empty());
        assert_eq!(unresolved, vec![root.clone()]);

        let err = engine.reconstruct(fixed_level(table), root.clone()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::IncompleteSchedule { ref unresolved, ref partial }
                if unresolved == &vec![root] && partial.is_empty()
        ));
    }
}
