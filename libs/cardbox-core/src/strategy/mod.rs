//! Extraction strategies, ordered from strictest to most protective.
//!
//! Each strategy takes the raw text plus an optional template and returns an
//! [`ExtractionResult`]. The [`crate::engine::DegradationEngine`] walks them
//! in the fixed order given by [`default_stack`].

mod fallback;
mod heuristic;
mod structural;

pub use fallback::{ProtectiveParsing, SimpleSplit};
pub use heuristic::{FuzzySegmentMatch, SemanticAnalysis};
pub use structural::{relax_pattern, RelaxedStructural, StrictStructural};

use crate::error::Result;
use crate::template::TemplateCompiler;
use crate::types::{ExtractionResult, StrategyKind, Template};

/// Shared, read-only inputs for a strategy attempt.
pub struct ExtractionContext<'a> {
    pub template: Option<&'a Template>,
    pub compiler: &'a TemplateCompiler,
}

/// A single level of the degradation cascade.
pub trait ExtractionStrategy: Send + Sync {
    /// Which strategy this is; also determines its level in the cascade.
    fn kind(&self) -> StrategyKind;

    /// Minimum confidence the engine requires to accept this level's result.
    fn min_confidence(&self) -> f64;

    /// Run the strategy.
    ///
    /// Implementations report failure through the result's `success` and
    /// `confidence` fields where they can; `Err` is reserved for unexpected
    /// execution failures, which the engine converts to a zero-confidence
    /// attempt rather than letting them escape.
    fn attempt(&self, text: &str, ctx: &ExtractionContext<'_>) -> Result<ExtractionResult>;
}

/// The six strategies in their fixed design order.
pub fn default_stack() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(StrictStructural),
        Box::new(RelaxedStructural),
        Box::new(FuzzySegmentMatch),
        Box::new(SemanticAnalysis),
        Box::new(SimpleSplit),
        Box::new(ProtectiveParsing),
    ]
}
