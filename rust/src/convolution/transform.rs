use rustc_hash::FxHashMap;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use super::{anchor_offset, Convolution};
use crate::engine::EngineError;
use crate::parallel::WorkerPool;
use crate::rounding::Padding;
use crate::table::{ConfigurationTable, Window};
use crate::vector::ProfileVector;
use crate::{log_debug, log_detail};

/// Amplitude above which a convolved indicator counts as a hit.
const HIT_THRESHOLD: f64 = 0.5;

/// Frequency-domain square.
///
/// Every distinct source value `m` gets an indicator grid of the cells that
/// hold it. The cyclic convolution of the grids for `m` and `m'` is non-zero
/// exactly where a pair of such cells sums, so `m + m'` is a candidate there.
/// Grids are padded per bucket so that the wrapped part never overlaps a cell
/// that is read back.
#[derive(Debug, Clone)]
pub struct TransformConvolution {
    pool: WorkerPool,
    padding: Padding,
    verbosity: u8,
}

impl TransformConvolution {
    pub fn new(pool: WorkerPool, padding: Padding, verbosity: u8) -> Self {
        Self {
            pool,
            padding,
            verbosity,
        }
    }
}

impl Convolution for TransformConvolution {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn square(
        &self,
        source: &ConfigurationTable,
        target: &mut ConfigurationTable,
    ) -> Result<(), EngineError> {
        target.reset();
        let Some((lowest, highest)) = source.value_range() else {
            return Ok(());
        };

        let window = source.window();
        let padded_deviations: Vec<usize> = (0..window.dim())
            .map(|bucket| self.padding.deviation(window.deviation(bucket)))
            .collect();
        let padded = Window::new(&padded_deviations);
        let grid = GridFft::new(&padded);
        let n = padded.len();

        let mut key = ProfileVector::zeros(window.dim());
        let mut groups: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
        for (idx, value) in source.known() {
            window.from_index(idx, &mut key);
            groups.entry(value).or_default().push(padded.to_index(&key));
        }
        let mut values: Vec<u32> = groups.keys().copied().collect();
        values.sort_unstable();

        let spectra: Vec<Vec<Complex<f64>>> = self.pool.map_collect(values.len(), |k| {
            let mut buf = vec![Complex::default(); n];
            for &p in &groups[&values[k]] {
                buf[p].re = 1.0;
            }
            grid.forward(&mut buf);
            buf
        });

        let offset = anchor_offset(source, target);
        let readout: Vec<Option<usize>> = (0..target.len())
            .map(|i| {
                target.window().from_index(i, &mut key);
                key += &offset;
                padded.try_index(&key)
            })
            .collect();

        let pairs: Vec<(usize, usize)> = (0..values.len())
            .flat_map(|a| (0..=a).map(move |b| (a, b)))
            .collect();
        log_debug!(
            self.verbosity,
            "transform: values {}..={} ({} distinct), {} pairs over {} padded cells",
            lowest,
            highest,
            values.len(),
            pairs.len(),
            n
        );

        let scale = 1.0 / n as f64;
        let target: &ConfigurationTable = target;
        self.pool.for_each_index_init(
            pairs.len(),
            1,
            || vec![Complex::default(); n],
            |buf, p| {
                let (a, b) = pairs[p];
                for ((out, x), y) in buf.iter_mut().zip(&spectra[a]).zip(&spectra[b]) {
                    *out = *x * *y;
                }
                grid.inverse(buf);
                let sum = values[a] + values[b];
                for (i, slot) in readout.iter().enumerate() {
                    if let Some(pi) = *slot {
                        if buf[pi].re * scale > HIT_THRESHOLD {
                            target.update_min_index(i, sum);
                        }
                    }
                }
            },
        );

        log_detail!(
            self.verbosity,
            "transform: square at {} has {} known cells",
            target.anchor(),
            target.known_count()
        );
        Ok(())
    }
}

/// Separable multi-dimensional FFT over a padded window.
struct GridFft {
    window: Window,
    forward: Vec<Arc<dyn Fft<f64>>>,
    inverse: Vec<Arc<dyn Fft<f64>>>,
}

impl GridFft {
    fn new(window: &Window) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let forward = (0..window.dim())
            .map(|bucket| planner.plan_fft_forward(window.deviation(bucket)))
            .collect();
        let inverse = (0..window.dim())
            .map(|bucket| planner.plan_fft_inverse(window.deviation(bucket)))
            .collect();
        Self {
            window: window.clone(),
            forward,
            inverse,
        }
    }

    fn forward(&self, data: &mut [Complex<f64>]) {
        self.apply(data, &self.forward);
    }

    /// Unnormalised: the result is scaled by the window length.
    fn inverse(&self, data: &mut [Complex<f64>]) {
        self.apply(data, &self.inverse);
    }

    /// Transform each axis in turn by gathering its strided lines.
    fn apply(&self, data: &mut [Complex<f64>], plans: &[Arc<dyn Fft<f64>>]) {
        for (bucket, plan) in plans.iter().enumerate() {
            let len = self.window.deviation(bucket);
            if len <= 1 {
                continue;
            }
            let stride = self.window.stride(bucket);
            let block = stride * len;
            let mut line = vec![Complex::default(); len];
            let mut scratch = vec![Complex::default(); plan.get_inplace_scratch_len()];
            for outer in (0..data.len()).step_by(block) {
                for inner in 0..stride {
                    let base = outer + inner;
                    for (t, slot) in line.iter_mut().enumerate() {
                        *slot = data[base + t * stride];
                    }
                    plan.process_with_scratch(&mut line, &mut scratch);
                    for (t, value) in line.iter().enumerate() {
                        data[base + t * stride] = *value;
                    }
                }
            }
        }
    }
}
