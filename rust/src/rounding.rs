//! Rounding schemes describing the bucket space of the convolution engine.
//!
//! A scheme fixes the dimension of every [`ProfileVector`](crate::ProfileVector),
//! the window width per bucket, the rounded job size (weight) of each bucket
//! and the normalised machine capacity the configurations must respect.

use crate::table::Window;

/// Approximation ratio paired with [`RoundingScheme::rounding9`].
pub const RATIO_EPSILON: f64 = 0.1754019165039063;

const ROUNDING9_SIZES: [f64; 9] = [
    0.556953353881836,
    0.48461708384337826,
    0.4122990417480468,
    0.3508038330078126,
    0.33470772331794213,
    0.2848099245600205,
    0.24230854192168913,
    0.2061495208740234,
    RATIO_EPSILON,
];

const ROUNDING10_SIZES: [f64; 10] = [
    12.0, 14.0, 16.0, 18.0, 21.0, 24.0, 28.0, 32.0, 36.0, 42.0,
];

/// Window width used by the presets.
pub const DEFAULT_DEVIATION: usize = 6;
pub const DEFAULT_MAX_L1_NORM: i32 = 3;

/// Smallest window width that keeps the zero vector inside the fixed-point window.
pub const MIN_DEVIATION: usize = 3;

/// Error types for scheme construction.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemeError {
    /// The scheme has no buckets.
    EmptyDimension,
    /// Weights and deviations disagree on the dimension.
    LengthMismatch { sizes: usize, deviations: usize },
    /// A window is too narrow to hold the fixed-point anchor.
    DeviationTooNarrow { bucket: usize, deviation: usize },
    /// A weight is negative or not finite.
    InvalidSize { bucket: usize, size: f64 },
    /// Capacity must be positive and finite.
    InvalidMakespan(f64),
    /// Precision must be non-negative and finite.
    InvalidPrecision(f64),
    /// A machine must hold at least one job.
    InvalidNorm(i32),
}

impl std::fmt::Display for SchemeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDimension => write!(f, "Rounding scheme needs at least one bucket"),
            Self::LengthMismatch { sizes, deviations } => write!(
                f,
                "Rounding scheme has {} sizes but {} deviations",
                sizes, deviations
            ),
            Self::DeviationTooNarrow { bucket, deviation } => write!(
                f,
                "Deviation {} of bucket {} is below the minimum of {}",
                deviation, bucket, MIN_DEVIATION
            ),
            Self::InvalidSize { bucket, size } => {
                write!(f, "Invalid size {} for bucket {}", size, bucket)
            }
            Self::InvalidMakespan(m) => write!(f, "Invalid makespan: {}", m),
            Self::InvalidPrecision(p) => write!(f, "Invalid precision: {}", p),
            Self::InvalidNorm(n) => write!(f, "Invalid maximum L1 norm: {}", n),
        }
    }
}

impl std::error::Error for SchemeError {}

/// Padding applied to the window before frequency-domain convolution.
///
/// Sums of two window keys span `[0, 2d - 2]` per bucket while the target is
/// read at an offset of 2 or 3, so the padded width must keep the wrapped
/// part of the cyclic convolution away from the cells that are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// `max(d + 3, 2d - 3)`: the narrowest width without aliasing.
    #[default]
    Minimal,
    /// `2d - 1`: no wraparound at any offset.
    Full,
}

impl Padding {
    /// Parse a padding name as used in [`EngineConfig`](crate::EngineConfig).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "minimal" => Some(Self::Minimal),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    /// Padded width for a bucket of window width `deviation`.
    pub fn deviation(self, deviation: usize) -> usize {
        match self {
            Self::Minimal => (deviation + 3).max((2 * deviation).saturating_sub(3)),
            Self::Full => 2 * deviation - 1,
        }
    }
}

/// Immutable description of the bucket space.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundingScheme {
    sizes: Vec<f64>,
    deviations: Vec<usize>,
    max_l1_norm: i32,
    makespan: f64,
    precision: f64,
}

impl RoundingScheme {
    /// Create a scheme, validating every parameter.
    pub fn new(
        sizes: Vec<f64>,
        deviations: Vec<usize>,
        max_l1_norm: i32,
        makespan: f64,
        precision: f64,
    ) -> Result<Self, SchemeError> {
        if sizes.is_empty() {
            return Err(SchemeError::EmptyDimension);
        }
        if sizes.len() != deviations.len() {
            return Err(SchemeError::LengthMismatch {
                sizes: sizes.len(),
                deviations: deviations.len(),
            });
        }
        for (bucket, &deviation) in deviations.iter().enumerate() {
            if deviation < MIN_DEVIATION {
                return Err(SchemeError::DeviationTooNarrow { bucket, deviation });
            }
        }
        for (bucket, &size) in sizes.iter().enumerate() {
            if !size.is_finite() || size < 0.0 {
                return Err(SchemeError::InvalidSize { bucket, size });
            }
        }
        if !makespan.is_finite() || makespan <= 0.0 {
            return Err(SchemeError::InvalidMakespan(makespan));
        }
        if !precision.is_finite() || precision < 0.0 {
            return Err(SchemeError::InvalidPrecision(precision));
        }
        if max_l1_norm < 1 {
            return Err(SchemeError::InvalidNorm(max_l1_norm));
        }

        Ok(Self {
            sizes,
            deviations,
            max_l1_norm,
            makespan,
            precision,
        })
    }

    /// Scheme with the same window width for every bucket.
    pub fn uniform(
        sizes: Vec<f64>,
        deviation: usize,
        max_l1_norm: i32,
        makespan: f64,
        precision: f64,
    ) -> Result<Self, SchemeError> {
        let deviations = vec![deviation; sizes.len()];
        Self::new(sizes, deviations, max_l1_norm, makespan, precision)
    }

    /// Nine geometric buckets between `RATIO_EPSILON` and `1 - 2 * RATIO_EPSILON`.
    pub fn rounding9() -> Self {
        Self {
            sizes: ROUNDING9_SIZES.to_vec(),
            deviations: vec![DEFAULT_DEVIATION; ROUNDING9_SIZES.len()],
            max_l1_norm: DEFAULT_MAX_L1_NORM,
            makespan: 1.0,
            precision: 0.00001,
        }
    }

    /// Ten integer buckets on a capacity of 72.
    ///
    /// Sizes are 12, 14, 16, 18, 21, 24, 28, 32, 36 and 42: steps of 4 from 24
    /// for buckets 5 to 8. The closed form `24 + 4 * i` for those buckets
    /// would give 44 to 56, past the 42 of the last bucket, and is not used.
    pub fn rounding10() -> Self {
        Self {
            sizes: ROUNDING10_SIZES.to_vec(),
            deviations: vec![DEFAULT_DEVIATION; ROUNDING10_SIZES.len()],
            max_l1_norm: DEFAULT_MAX_L1_NORM,
            makespan: 72.0,
            precision: 0.0,
        }
    }

    /// `k` buckets of integer sizes `1..=k` on a capacity of `k + 1`.
    pub fn arithmetic(k: usize) -> Result<Self, SchemeError> {
        let sizes = (1..=k).map(|s| s as f64).collect();
        Self::uniform(
            sizes,
            DEFAULT_DEVIATION,
            DEFAULT_MAX_L1_NORM,
            (k + 1) as f64,
            0.0,
        )
    }

    /// Same scheme with different window widths.
    pub fn with_deviations(&self, deviations: Vec<usize>) -> Result<Self, SchemeError> {
        Self::new(
            self.sizes.clone(),
            deviations,
            self.max_l1_norm,
            self.makespan,
            self.precision,
        )
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    pub fn deviation(&self, bucket: usize) -> usize {
        self.deviations[bucket]
    }

    pub fn deviations(&self) -> &[usize] {
        &self.deviations
    }

    #[inline]
    pub fn size(&self, bucket: usize) -> f64 {
        self.sizes[bucket]
    }

    pub fn sizes(&self) -> &[f64] {
        &self.sizes
    }

    pub fn max_l1_norm(&self) -> i32 {
        self.max_l1_norm
    }

    pub fn makespan(&self) -> f64 {
        self.makespan
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Lower end of the coarser index range that covers half of `[begin, ..)`.
    ///
    /// Odd `begin` maps to `(begin - 1) / 2 - 1`, even to `begin / 2 - 1`.
    /// Every non-negative start reaches the fixed point `-2`.
    #[inline]
    pub fn previous_interval(&self, _bucket: usize, begin: i32) -> i32 {
        begin.div_euclid(2) - 1
    }

    /// Bucket of the largest weight not exceeding the normalised size `p`.
    ///
    /// Returns `None` when `p` is smaller than every weight.
    pub fn rounded_index(&self, p: f64) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (bucket, &size) in self.sizes.iter().enumerate() {
            if p < size {
                continue;
            }
            match best {
                Some(b) if self.sizes[b] >= size => {}
                _ => best = Some(bucket),
            }
        }
        best
    }

    /// Whether a load fits strictly below capacity, as required of base configurations.
    #[inline]
    pub fn fits_single_machine(&self, volume: f64) -> bool {
        volume <= self.makespan - self.precision
    }

    /// Whether a load respects the capacity up to the precision.
    #[inline]
    pub fn within_capacity(&self, volume: f64) -> bool {
        volume <= self.makespan + self.precision
    }

    /// Window spanned by a configuration table.
    pub fn window(&self) -> Window {
        Window::new(&self.deviations)
    }

    /// Window used by the frequency-domain convolution.
    pub fn padded_window(&self, padding: Padding) -> Window {
        let padded: Vec<usize> = self
            .deviations
            .iter()
            .map(|&d| padding.deviation(d))
            .collect();
        Window::new(&padded)
    }
}
