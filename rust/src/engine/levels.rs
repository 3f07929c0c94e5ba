//! Doubling ladder: fixed-point closure and the squarings back up to an anchor.

use crate::log_progress;
use crate::table::ConfigurationTable;
use crate::vector::ProfileVector;

use super::core::{EngineError, SchedulingEngine};

/// Tables for one refinement step of the ladder.
///
/// `fine` is keyed at `anchor`; `coarse` is keyed at `previous_anchor(anchor)`
/// and `fine` is its square. At the fixed point both hold the closure.
#[derive(Debug)]
pub struct Level {
    pub anchor: ProfileVector,
    pub fine: ConfigurationTable,
    pub coarse: ConfigurationTable,
}

impl Level {
    /// Whether `fine` is already the closure table.
    pub fn fine_is_fixed_point(&self, engine: &SchedulingEngine) -> bool {
        engine.previous_anchor(&self.anchor) == self.anchor
    }

    /// Whether `coarse` is the closure table, so that refining further changes nothing.
    pub fn coarse_is_fixed_point(&self, engine: &SchedulingEngine) -> bool {
        let coarse = self.coarse.anchor();
        &engine.previous_anchor(coarse) == coarse
    }
}

impl SchedulingEngine {
    /// Anchors from `anchor` down to the fixed point, both ends included.
    pub(crate) fn anchor_chain(&self, anchor: &ProfileVector) -> Vec<ProfileVector> {
        let mut chain = vec![anchor.clone()];
        loop {
            let current = &chain[chain.len() - 1];
            let next = self.previous_anchor(current);
            if &next == current {
                return chain;
            }
            chain.push(next);
        }
    }

    /// Square the base table at a fixed anchor until it stops changing.
    pub(crate) fn close(&self, fixed: &ProfileVector) -> Result<ConfigurationTable, EngineError> {
        let mut current = ConfigurationTable::for_scheme(self.scheme(), fixed.clone());
        current.initialize(self.scheme(), fixed);
        let mut next = ConfigurationTable::for_scheme(self.scheme(), fixed.clone());

        let mut rounds = 0usize;
        loop {
            self.convolution().square(&current, &mut next)?;
            rounds += 1;
            if next == current {
                break;
            }
            std::mem::swap(&mut current, &mut next);
        }
        log_progress!(
            self.verbosity(),
            "closure at {} after {} squarings, {} known cells",
            fixed,
            rounds,
            next.known_count()
        );
        Ok(next)
    }

    /// Build the tables at `anchor` and at its previous anchor.
    ///
    /// Only two tables are alive at a time; the ladder is recomputed from
    /// the fixed point on every call.
    pub fn build_level(&self, anchor: &ProfileVector) -> Result<Level, EngineError> {
        let chain = self.anchor_chain(anchor);
        let fixed = &chain[chain.len() - 1];
        let mut coarse = self.close(fixed)?;
        if chain.len() == 1 {
            return Ok(Level {
                anchor: anchor.clone(),
                fine: coarse.clone(),
                coarse,
            });
        }

        let mut fine = ConfigurationTable::for_scheme(self.scheme(), fixed.clone());
        for (step, target_anchor) in chain[..chain.len() - 1].iter().enumerate().rev() {
            fine.set_anchor(target_anchor);
            self.convolution().square(&coarse, &mut fine)?;
            if step > 0 {
                std::mem::swap(&mut fine, &mut coarse);
            }
        }
        log_progress!(
            self.verbosity(),
            "level {}: {} known fine cells, {} known coarse cells",
            anchor,
            fine.known_count(),
            coarse.known_count()
        );
        Ok(Level {
            anchor: anchor.clone(),
            fine,
            coarse,
        })
    }
}
