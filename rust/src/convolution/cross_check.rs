use super::Convolution;
use crate::engine::EngineError;
use crate::table::ConfigurationTable;
use crate::{log_debug, log_error};

/// Runs two strategies on the same square and fails when their tables differ.
///
/// The primary writes first and its hash is recorded; the secondary then
/// overwrites the target, so on success the target holds the secondary's result.
pub struct CrossCheckConvolution {
    primary: Box<dyn Convolution>,
    secondary: Box<dyn Convolution>,
    verbosity: u8,
}

impl CrossCheckConvolution {
    pub fn new(primary: Box<dyn Convolution>, secondary: Box<dyn Convolution>, verbosity: u8) -> Self {
        Self {
            primary,
            secondary,
            verbosity,
        }
    }
}

impl Convolution for CrossCheckConvolution {
    fn name(&self) -> &'static str {
        "cross-check"
    }

    fn square(
        &self,
        source: &ConfigurationTable,
        target: &mut ConfigurationTable,
    ) -> Result<(), EngineError> {
        self.primary.square(source, target)?;
        let primary_hash = target.content_hash();
        self.secondary.square(source, target)?;
        let secondary_hash = target.content_hash();

        log_debug!(
            self.verbosity,
            "cross-check at {}: {} {:#018x}, {} {:#018x}",
            target.anchor(),
            self.primary.name(),
            primary_hash,
            self.secondary.name(),
            secondary_hash
        );
        if primary_hash != secondary_hash {
            log_error!(
                self.verbosity,
                "Convolution mismatch at anchor {}: {} and {} disagree",
                target.anchor(),
                self.primary.name(),
                self.secondary.name()
            );
            return Err(EngineError::ConvolutionMismatch {
                primary: self.primary.name(),
                secondary: self.secondary.name(),
                primary_hash,
                secondary_hash,
            });
        }
        Ok(())
    }
}
