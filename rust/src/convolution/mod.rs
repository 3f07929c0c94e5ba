//! Min-plus self-convolution of configuration tables.
//!
//! Squaring a source table at anchor `S` into a target at anchor `T` writes,
//! for every target key `c`, the minimum of `source[a] + source[b]` over all
//! source keys with `a + b + 2S - T = c`. Every strategy produces the same
//! table; they differ only in how the candidate pairs are enumerated.

mod cross_check;
mod direct;
mod parallel_direct;
mod transform;

pub use cross_check::CrossCheckConvolution;
pub use direct::DirectConvolution;
pub use parallel_direct::ParallelDirectConvolution;
pub use transform::TransformConvolution;

use crate::engine::EngineError;
use crate::parallel::WorkerPool;
use crate::rounding::Padding;
use crate::table::ConfigurationTable;
use crate::vector::ProfileVector;

/// One way of squaring a configuration table.
pub trait Convolution: Send + Sync {
    fn name(&self) -> &'static str;

    /// Overwrite `target` (its anchor already set) with the square of `source`.
    fn square(
        &self,
        source: &ConfigurationTable,
        target: &mut ConfigurationTable,
    ) -> Result<(), EngineError>;
}

/// Selectable convolution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvolutionKind {
    Direct,
    ParallelDirect,
    Transform,
    CrossCheck,
}

impl ConvolutionKind {
    pub const NAMES: [&'static str; 4] = ["direct", "parallel-direct", "transform", "cross-check"];

    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name {
            "direct" => Ok(Self::Direct),
            "parallel-direct" | "parallel_direct" => Ok(Self::ParallelDirect),
            "transform" | "fft" => Ok(Self::Transform),
            "cross-check" | "cross_check" => Ok(Self::CrossCheck),
            _ => Err(EngineError::UnknownStrategy(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ParallelDirect => "parallel-direct",
            Self::Transform => "transform",
            Self::CrossCheck => "cross-check",
        }
    }

    /// Instantiate the strategy. Concurrent strategies share `pool`.
    pub fn build(self, pool: &WorkerPool, padding: Padding, verbosity: u8) -> Box<dyn Convolution> {
        match self {
            Self::Direct => Box::new(DirectConvolution::new()),
            Self::ParallelDirect => Box::new(ParallelDirectConvolution::new(pool.clone())),
            Self::Transform => Box::new(TransformConvolution::new(pool.clone(), padding, verbosity)),
            Self::CrossCheck => Box::new(CrossCheckConvolution::new(
                Box::new(TransformConvolution::new(pool.clone(), padding, verbosity)),
                Box::new(ParallelDirectConvolution::new(pool.clone())),
                verbosity,
            )),
        }
    }
}

/// `T - 2S`: a target key `c` collects source pairs with `a + b = c + offset`.
pub(crate) fn anchor_offset(source: &ConfigurationTable, target: &ConfigurationTable) -> ProfileVector {
    let mut offset = target.anchor().clone();
    offset -= source.anchor();
    offset -= source.anchor();
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingScheme;
    use crate::table::Window;

    fn scheme() -> RoundingScheme {
        RoundingScheme::uniform(vec![0.45, 0.35, 0.25], 6, 3, 1.0, 0.00001).unwrap()
    }

    /// Source/target anchor pairs `(previous_anchor(a), a)` down a halving chain.
    fn ladder(scheme: &RoundingScheme, profile: &[i32]) -> Vec<(ProfileVector, ProfileVector)> {
        let mut anchors = vec![ProfileVector::from_slice(profile)];
        loop {
            let last = anchors.last().unwrap();
            let mut next = last.clone();
            for i in 0..next.dim() {
                next[i] = scheme.previous_interval(i, last[i]);
            }
            if &next == last {
                break;
            }
            anchors.push(next);
        }
        let fixed = anchors.last().unwrap().clone();
        let mut pairs = vec![(fixed.clone(), fixed)];
        for w in anchors.windows(2).rev() {
            pairs.push((w[1].clone(), w[0].clone()));
        }
        pairs
    }

    /// Run every strategy down the ladder and check they agree at each step.
    fn assert_strategies_agree(scheme: &RoundingScheme, profile: &[i32], padding: Padding) {
        let pool = WorkerPool::new(4).unwrap();
        let strategies: Vec<Box<dyn Convolution>> = vec![
            ConvolutionKind::Direct.build(&pool, padding, 0),
            ConvolutionKind::ParallelDirect.build(&pool, padding, 0),
            ConvolutionKind::Transform.build(&pool, padding, 0),
            ConvolutionKind::CrossCheck.build(&pool, padding, 0),
        ];

        let pairs = ladder(scheme, profile);
        let fixed = pairs[0].0.clone();
        let mut source = ConfigurationTable::for_scheme(scheme, fixed.clone());
        source.initialize(scheme, &fixed);

        for (source_anchor, target_anchor) in pairs {
            source.set_anchor(&source_anchor);
            let mut reference = ConfigurationTable::for_scheme(scheme, target_anchor.clone());
            strategies[0].square(&source, &mut reference).unwrap();
            for strategy in &strategies[1..] {
                let mut target = ConfigurationTable::for_scheme(scheme, target_anchor.clone());
                strategy.square(&source, &mut target).unwrap();
                assert_eq!(
                    target, reference,
                    "{} disagrees with direct at anchor {}",
                    strategy.name(),
                    target_anchor
                );
            }
            source = reference;
        }
    }

    #[test]
    fn test_parse_names() {
        for name in ConvolutionKind::NAMES {
            assert_eq!(ConvolutionKind::parse(name).unwrap().name(), name);
        }
        assert_eq!(ConvolutionKind::parse("fft").unwrap(), ConvolutionKind::Transform);
        assert!(matches!(
            ConvolutionKind::parse("quantum"),
            Err(EngineError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_anchor_offset_is_two_or_three() {
        let s = scheme();
        for begin in -2..40 {
            let target = ConfigurationTable::new(Window::new(&[1]), ProfileVector::from(vec![begin]));
            let source = ConfigurationTable::new(
                Window::new(&[1]),
                ProfileVector::from(vec![s.previous_interval(0, begin)]),
            );
            let offset = anchor_offset(&source, &target)[0];
            assert!(offset == 2 || offset == 3, "offset {} at {}", offset, begin);
        }
    }

    #[test]
    fn test_strategies_agree_on_ladder() {
        let s = scheme();
        assert_strategies_agree(&s, &[5, 3, 1], Padding::Minimal);
        assert_strategies_agree(&s, &[12, 0, 7], Padding::Minimal);
    }

    #[test]
    fn test_strategies_agree_with_full_padding() {
        let s = scheme();
        assert_strategies_agree(&s, &[9, 9, 9], Padding::Full);
    }

    #[test]
    fn test_strategies_agree_with_substitutions() {
        let s = RoundingScheme::uniform(vec![0.5, 0.25, 0.2], 6, 3, 1.0, 0.00001).unwrap();
        assert_strategies_agree(&s, &[4, 6, 2], Padding::Minimal);
    }

    #[test]
    fn test_strategies_agree_on_uneven_windows() {
        let s = RoundingScheme::new(vec![0.45, 0.3], vec![4, 7], 3, 1.0, 0.00001).unwrap();
        assert_strategies_agree(&s, &[7, 11], Padding::Minimal);
    }

    #[test]
    fn test_empty_source_yields_empty_target() {
        let s = scheme();
        let pool = WorkerPool::new(2).unwrap();
        let anchor = ProfileVector::from(vec![-2, -2, -2]);
        let source = ConfigurationTable::for_scheme(&s, anchor.clone());
        for kind in [
            ConvolutionKind::Direct,
            ConvolutionKind::ParallelDirect,
            ConvolutionKind::Transform,
        ] {
            let mut target = ConfigurationTable::for_scheme(&s, anchor.clone());
            target.store_index(0, Some(4));
            kind.build(&pool, Padding::Minimal, 0)
                .square(&source, &mut target)
                .unwrap();
            assert_eq!(target.known_count(), 0, "{}", kind.name());
        }
    }
}
