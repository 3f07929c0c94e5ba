use super::{anchor_offset, Convolution};
use crate::engine::EngineError;
use crate::table::ConfigurationTable;
use crate::vector::ProfileVector;

/// Single-threaded scan over every unordered pair of known source cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectConvolution;

impl DirectConvolution {
    pub fn new() -> Self {
        Self
    }
}

impl Convolution for DirectConvolution {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn square(
        &self,
        source: &ConfigurationTable,
        target: &mut ConfigurationTable,
    ) -> Result<(), EngineError> {
        target.reset();
        let offset = anchor_offset(source, target);
        let window = source.window();
        let known: Vec<(usize, u32)> = source.known().collect();

        let dim = window.dim();
        let mut a = ProfileVector::zeros(dim);
        let mut c = ProfileVector::zeros(dim);
        for (pos, &(i, va)) in known.iter().enumerate() {
            window.from_index(i, &mut a);
            a -= &offset;
            for &(j, vb) in &known[pos..] {
                window.from_index(j, &mut c);
                c += &a;
                if let Some(idx) = target.window().try_index(&c) {
                    target.update_min_index(idx, va + vb);
                }
            }
        }
        Ok(())
    }
}
