use super::{anchor_offset, Convolution};
use crate::engine::EngineError;
use crate::parallel::{preferred_chunk_size, WorkerPool};
use crate::table::ConfigurationTable;
use crate::vector::ProfileVector;

/// Output-parallel scan: every target cell searches its own decompositions.
///
/// Of the two summands of a decomposition one has the smaller last
/// component, so only one half of the last bucket's range needs scanning.
/// The narrower half is chosen per cell.
#[derive(Debug, Clone)]
pub struct ParallelDirectConvolution {
    pool: WorkerPool,
}

impl ParallelDirectConvolution {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }
}

impl Convolution for ParallelDirectConvolution {
    fn name(&self) -> &'static str {
        "parallel-direct"
    }

    fn square(
        &self,
        source: &ConfigurationTable,
        target: &mut ConfigurationTable,
    ) -> Result<(), EngineError> {
        let offset = anchor_offset(source, target);
        let target: &ConfigurationTable = target;
        let window = source.window();
        let dim = window.dim();
        let last = dim - 1;
        let dev_last = window.deviation(last) as i32;
        let stride_last = window.stride(last);

        self.pool.for_each_index_init(
            target.len(),
            preferred_chunk_size(target.len()),
            || (ProfileVector::zeros(dim), ProfileVector::zeros(dim)),
            |(sum, c), i| {
                target.window().from_index(i, sum);
                *sum += &offset;

                let total = sum[last];
                let lower_count = total.div_euclid(2) + 1;
                let upper_start = total - total.div_euclid(2);
                let (lo, hi) = if lower_count <= dev_last - upper_start {
                    (0, lower_count)
                } else {
                    (upper_start, dev_last)
                };
                let lo = lo.clamp(0, dev_last) as usize;
                let hi = hi.clamp(0, dev_last) as usize;

                let mut best: Option<u32> = None;
                for j in lo * stride_last..hi * stride_last {
                    let Some(vb) = source.get_index(j) else {
                        continue;
                    };
                    window.from_index(j, c);
                    for k in 0..dim {
                        c[k] = sum[k] - c[k];
                    }
                    let Some(vc) = window.try_index(c).and_then(|k| source.get_index(k)) else {
                        continue;
                    };
                    let candidate = vb + vc;
                    if best.map_or(true, |v| candidate < v) {
                        best = Some(candidate);
                    }
                }
                target.store_index(i, best);
            },
        );
        Ok(())
    }
}
