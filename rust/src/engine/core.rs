//! Core engine: validation, minimum machine counts and schedule reconstruction.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::convolution::{Convolution, ConvolutionKind};
use crate::parallel::WorkerPool;
use crate::rounding::{Padding, RoundingScheme};
use crate::vector::ProfileVector;
use crate::{log_detail, log_progress};

use super::backtrace::{best_split_value, Backtrace, Target};
use super::cleanup::remove_replacement_columns;
use super::levels::Level;

/// Machine count reported for profiles that no composition of configurations reaches.
pub const INFEASIBLE: u32 = u32::MAX;

/// Errors that can occur while deciding or reconstructing schedules.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Profile has {got} buckets, scheme expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Profile has negative job counts: {0}")]
    NegativeProfile(ProfileVector),
    #[error("Unknown convolution strategy: {0}")]
    UnknownStrategy(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Convolution strategies {primary} ({primary_hash:#x}) and {secondary} ({secondary_hash:#x}) disagree")]
    ConvolutionMismatch {
        primary: &'static str,
        secondary: &'static str,
        primary_hash: u64,
        secondary_hash: u64,
    },
    #[error("Could not split {} backtrace targets", .unresolved.len())]
    IncompleteSchedule {
        unresolved: Vec<Target>,
        partial: Vec<ProfileVector>,
    },
    #[error("No configuration has a surplus in bucket {bucket} to absorb {vector}")]
    UnresolvedDebit { bucket: usize, vector: ProfileVector },
}

/// Engine bound to one rounding scheme and one convolution strategy.
pub struct SchedulingEngine {
    scheme: RoundingScheme,
    convolution: Box<dyn Convolution>,
    max_fixed_point_passes: usize,
    verbosity: u8,
}

impl SchedulingEngine {
    /// Create an engine, validating the configuration up front.
    pub fn new(scheme: RoundingScheme, config: &EngineConfig) -> Result<Self, EngineError> {
        let kind = ConvolutionKind::parse(&config.strategy)?;
        let padding = Padding::parse(&config.padding).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "padding must be \"minimal\" or \"full\", got {:?}",
                config.padding
            ))
        })?;
        if config.worker_cap == 0 {
            return Err(EngineError::InvalidConfig(
                "worker_cap must be at least 1".to_string(),
            ));
        }
        if config.max_fixed_point_passes == 0 {
            return Err(EngineError::InvalidConfig(
                "max_fixed_point_passes must be at least 1".to_string(),
            ));
        }

        let pool = WorkerPool::new(config.worker_cap)?;
        log_progress!(
            config.verbosity,
            "engine: {} strategy on {} workers, {} buckets",
            kind.name(),
            pool.workers(),
            scheme.dim()
        );
        let convolution = kind.build(&pool, padding, config.verbosity);
        Ok(Self::with_convolution(scheme, convolution, config))
    }

    /// Create an engine around an already constructed strategy.
    pub fn with_convolution(
        scheme: RoundingScheme,
        convolution: Box<dyn Convolution>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            scheme,
            convolution,
            max_fixed_point_passes: config.max_fixed_point_passes.max(1),
            verbosity: config.verbosity,
        }
    }

    pub fn scheme(&self) -> &RoundingScheme {
        &self.scheme
    }

    pub fn convolution_name(&self) -> &'static str {
        self.convolution.name()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub(crate) fn convolution(&self) -> &dyn Convolution {
        self.convolution.as_ref()
    }

    pub(crate) fn max_fixed_point_passes(&self) -> usize {
        self.max_fixed_point_passes
    }

    /// Apply the interval-halving rule to every component.
    pub fn previous_anchor(&self, anchor: &ProfileVector) -> ProfileVector {
        let mut out = anchor.clone();
        for bucket in 0..out.dim() {
            out[bucket] = self.scheme.previous_interval(bucket, anchor[bucket]);
        }
        out
    }

    fn validate(&self, profile: &ProfileVector) -> Result<(), EngineError> {
        if profile.dim() != self.scheme.dim() {
            return Err(EngineError::DimensionMismatch {
                expected: self.scheme.dim(),
                got: profile.dim(),
            });
        }
        if !profile.is_non_negative() {
            return Err(EngineError::NegativeProfile(profile.clone()));
        }
        Ok(())
    }

    /// Minimum number of machines whose configurations sum to `profile`.
    ///
    /// Returns [`INFEASIBLE`] when no composition reaches the profile.
    pub fn min_machines(&self, profile: &ProfileVector) -> Result<u32, EngineError> {
        self.validate(profile)?;
        if profile.is_zero() {
            return Ok(0);
        }
        if self.scheme.fits_single_machine(profile.volume(&self.scheme)) {
            return Ok(1);
        }

        let level = self.build_level(profile)?;
        let machines = level.fine.get_actual(profile).unwrap_or(INFEASIBLE);
        log_progress!(
            self.verbosity,
            "min_machines {} = {}",
            profile,
            if machines == INFEASIBLE {
                "infeasible".to_string()
            } else {
                machines.to_string()
            }
        );
        Ok(machines)
    }

    /// Per-machine configurations summing to `profile` using at most `machines` machines.
    ///
    /// An empty list means the profile is empty, `machines` is zero, or more
    /// than `machines` machines would be needed.
    pub fn compute_schedule(
        &self,
        profile: &ProfileVector,
        machines: u32,
    ) -> Result<Vec<ProfileVector>, EngineError> {
        self.validate(profile)?;
        if profile.is_zero() || machines == 0 {
            return Ok(Vec::new());
        }
        if self.scheme.fits_single_machine(profile.volume(&self.scheme)) {
            return Ok(vec![profile.clone()]);
        }

        let anchor = self.previous_anchor(profile);
        let level = self.build_level(&anchor)?;
        let count = match best_split_value(&level.fine, profile) {
            Some(count) if count <= machines => count,
            other => {
                log_progress!(
                    self.verbosity,
                    "compute_schedule {}: needs {:?} machines, {} available",
                    profile,
                    other,
                    machines
                );
                return Ok(Vec::new());
            }
        };

        let root = Target {
            vector: profile.clone(),
            count,
        };
        let configurations = self.reconstruct(level, root)?;
        log_progress!(
            self.verbosity,
            "compute_schedule {}: {} machines",
            profile,
            configurations.len()
        );
        for (machine, config) in configurations.iter().enumerate() {
            log_detail!(
                self.verbosity,
                "  machine {}: {} (load {:.5})",
                machine,
                config,
                config.volume(&self.scheme)
            );
        }
        Ok(configurations)
    }

    /// Backtrace `root` from `level` and fold the replacement columns.
    ///
    /// Targets no table could split make the whole result an
    /// [`EngineError::IncompleteSchedule`] carrying the configurations found so far.
    pub(crate) fn reconstruct(
        &self,
        level: Level,
        root: Target,
    ) -> Result<Vec<ProfileVector>, EngineError> {
        let (mut configurations, unresolved) = Backtrace::new(self, level, root).run()?;
        if !unresolved.is_empty() {
            return Err(EngineError::IncompleteSchedule {
                unresolved,
                partial: configurations,
            });
        }
        remove_replacement_columns(&mut configurations)?;
        Ok(configurations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolution::DirectConvolution;
    use crate::vector::sum_vectors;
    use rustc_hash::FxHashMap;

    fn example_scheme() -> RoundingScheme {
        RoundingScheme::uniform(vec![0.6, 0.4, 0.34], 6, 3, 1.0, 0.00001).unwrap()
    }

    fn three_bucket_scheme() -> RoundingScheme {
        RoundingScheme::uniform(vec![0.45, 0.35, 0.25], 6, 3, 1.0, 0.00001).unwrap()
    }

    fn engine(scheme: RoundingScheme, strategy: &str) -> SchedulingEngine {
        let mut config = EngineConfig::with_strategy(strategy);
        config.worker_cap = 4;
        SchedulingEngine::new(scheme, &config).unwrap()
    }

    fn pv(values: &[i32]) -> ProfileVector {
        ProfileVector::from_slice(values)
    }

    /// Exact bin-packing optimum over base configurations, by memoised recursion.
    fn brute_force(
        scheme: &RoundingScheme,
        profile: &ProfileVector,
        memo: &mut FxHashMap<ProfileVector, u32>,
    ) -> u32 {
        if profile.is_zero() {
            return 0;
        }
        if let Some(&v) = memo.get(profile) {
            return v;
        }
        let mut configs = Vec::new();
        crate::table::for_each_configuration(scheme.dim(), scheme.max_l1_norm(), &mut |c| {
            if scheme.fits_single_machine(c.volume(scheme)) {
                configs.push(c.clone());
            }
        });
        let mut best = INFEASIBLE;
        for config in configs {
            let rest = profile - &config;
            if !rest.is_non_negative() {
                continue;
            }
            let sub = brute_force(scheme, &rest, memo);
            if sub != INFEASIBLE {
                best = best.min(sub + 1);
            }
        }
        memo.insert(profile.clone(), best);
        best
    }

    fn assert_valid_schedule(scheme: &RoundingScheme, profile: &ProfileVector, schedule: &[ProfileVector]) {
        assert_eq!(&sum_vectors(scheme.dim(), schedule), profile);
        for config in schedule {
            assert!(config.is_non_negative(), "negative configuration {}", config);
            assert!(!config.is_zero());
            assert!(
                scheme.within_capacity(config.volume(scheme)),
                "configuration {} overloads a machine",
                config
            );
        }
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let mut config = EngineConfig::with_strategy("simplex");
        assert!(matches!(
            SchedulingEngine::new(example_scheme(), &config),
            Err(EngineError::UnknownStrategy(_))
        ));

        config.strategy = "direct".to_string();
        config.padding = "huge".to_string();
        assert!(matches!(
            SchedulingEngine::new(example_scheme(), &config),
            Err(EngineError::InvalidConfig(_))
        ));

        config.padding = "full".to_string();
        config.worker_cap = 0;
        assert!(matches!(
            SchedulingEngine::new(example_scheme(), &config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validation() {
        let e = engine(example_scheme(), "direct");
        assert!(matches!(
            e.min_machines(&pv(&[1, 1])),
            Err(EngineError::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(
            e.compute_schedule(&pv(&[1, -1, 0]), 3),
            Err(EngineError::NegativeProfile(_))
        ));
    }

    #[test]
    fn test_trivial_profiles() {
        let e = engine(example_scheme(), "direct");
        assert_eq!(e.min_machines(&pv(&[0, 0, 0])).unwrap(), 0);
        assert_eq!(e.min_machines(&pv(&[1, 0, 0])).unwrap(), 1);
        assert_eq!(e.min_machines(&pv(&[0, 1, 1])).unwrap(), 1);

        assert!(e.compute_schedule(&pv(&[0, 0, 0]), 4).unwrap().is_empty());
        assert!(e.compute_schedule(&pv(&[1, 1, 1]), 0).unwrap().is_empty());
        assert_eq!(e.compute_schedule(&pv(&[0, 0, 2]), 1).unwrap(), vec![pv(&[0, 0, 2])]);
    }

    #[test]
    fn test_worked_example() {
        let scheme = example_scheme();

        for strategy in ["direct", "parallel-direct", "transform", "cross-check"] {
            let e = engine(scheme.clone(), strategy);
            let profile = pv(&[1, 1, 1]);
            assert_eq!(e.min_machines(&profile).unwrap(), 2, "{}", strategy);

            let schedule = e.compute_schedule(&profile, 2).unwrap();
            assert_eq!(schedule.len(), 2, "{}", strategy);
            assert_valid_schedule(&scheme, &profile, &schedule);

            assert!(e.compute_schedule(&profile, 1).unwrap().is_empty());
        }
    }

    #[test]
    fn test_worked_example_exact_capacity() {
        // At zero precision 0.6 + 0.4 exactly fills a machine.
        let scheme = RoundingScheme::uniform(vec![0.6, 0.4, 0.34], 6, 3, 1.0, 0.0).unwrap();
        let e = engine(scheme.clone(), "direct");
        assert_eq!(e.min_machines(&pv(&[1, 1, 0])).unwrap(), 1);
        assert_eq!(e.min_machines(&pv(&[1, 1, 1])).unwrap(), 2);

        let schedule = e.compute_schedule(&pv(&[1, 1, 1]), 2).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_valid_schedule(&scheme, &pv(&[1, 1, 1]), &schedule);

        // With a positive precision the pair no longer fits.
        let e = engine(example_scheme(), "direct");
        assert_eq!(e.min_machines(&pv(&[1, 1, 0])).unwrap(), 2);
    }

    #[test]
    fn test_single_bucket_pairs() {
        let e = engine(three_bucket_scheme(), "transform");
        // Two 0.45 jobs per machine.
        assert_eq!(e.min_machines(&pv(&[4, 0, 0])).unwrap(), 2);
        assert_eq!(e.min_machines(&pv(&[6, 0, 0])).unwrap(), 3);
        assert_eq!(e.min_machines(&pv(&[7, 0, 0])).unwrap(), 4);
        // Three 0.25 jobs per machine.
        assert_eq!(e.min_machines(&pv(&[0, 0, 9])).unwrap(), 3);
    }

    #[test]
    fn test_matches_brute_force_inside_base_window() {
        let scheme = three_bucket_scheme();
        let e = engine(scheme.clone(), "transform");
        let mut memo = FxHashMap::default();
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    let profile = pv(&[x, y, z]);
                    let expected = brute_force(&scheme, &profile, &mut memo);
                    let got = e.min_machines(&profile).unwrap();
                    assert_eq!(got, expected, "{}", profile);
                }
            }
        }
    }

    #[test]
    fn test_schedule_round_trip() {
        let scheme = three_bucket_scheme();
        let e = engine(scheme.clone(), "transform");
        for values in [[5, 3, 1], [2, 2, 2], [8, 1, 6], [0, 7, 3], [11, 4, 9]] {
            let profile = pv(&values);
            let machines = e.min_machines(&profile).unwrap();
            assert_ne!(machines, INFEASIBLE);

            let schedule = e.compute_schedule(&profile, machines).unwrap();
            assert!(!schedule.is_empty(), "{}", profile);
            assert!(schedule.len() as u32 <= machines, "{}", profile);
            assert_valid_schedule(&scheme, &profile, &schedule);

            assert!(e.compute_schedule(&profile, machines - 1).unwrap().is_empty());
            let relaxed = e.compute_schedule(&profile, machines + 3).unwrap();
            assert_valid_schedule(&scheme, &profile, &relaxed);
        }
    }

    #[test]
    fn test_strategies_produce_identical_schedules() {
        let scheme = three_bucket_scheme();
        let profile = pv(&[9, 5, 7]);
        let reference = SchedulingEngine::with_convolution(
            scheme.clone(),
            Box::new(DirectConvolution::new()),
            &EngineConfig::default(),
        )
        .compute_schedule(&profile, 20)
        .unwrap();
        for strategy in ["parallel-direct", "transform", "cross-check"] {
            let schedule = engine(scheme.clone(), strategy)
                .compute_schedule(&profile, 20)
                .unwrap();
            assert_eq!(schedule, reference, "{}", strategy);
        }
    }

    #[test]
    fn test_repeated_calls_are_deterministic() {
        let e = engine(three_bucket_scheme(), "transform");
        let profile = pv(&[6, 4, 5]);
        let first = e.compute_schedule(&profile, 10).unwrap();
        for _ in 0..3 {
            assert_eq!(e.compute_schedule(&profile, 10).unwrap(), first);
        }
    }

    #[test]
    fn test_substitution_counts_respect_volume() {
        let scheme = RoundingScheme::uniform(vec![0.5, 0.25, 0.2], 6, 3, 1.0, 0.00001).unwrap();
        let e = engine(scheme.clone(), "transform");
        for values in [[3, 4, 5], [0, 4, 0], [2, 2, 2]] {
            let profile = pv(&values);
            let machines = e.min_machines(&profile).unwrap();
            let volume = profile.volume(&scheme);
            assert!(
                machines as f64 >= volume / scheme.makespan(),
                "{} needs at least {:.2} machines, got {}",
                profile,
                volume,
                machines
            );
        }
    }
}
