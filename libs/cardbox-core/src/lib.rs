//! Core extraction library shared by the cardbox applications.
//!
//! Provides:
//! - Cascading, confidence-scored extraction of flashcard fields from
//!   freeform Markdown notes (six strategies, strict to protective)
//! - Segment classification against a static pattern library
//! - Template compilation with a content-addressed cache
//! - Post-hoc integrity checking of stored fields against source text
//! - Repair suggestion generation and application
//!
//! The original text is never lost: every extraction result carries it in
//! the `notes` field, whatever the cascade had to fall back to.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod integrity;
pub mod patterns;
pub mod repair;
pub mod similarity;
pub mod strategy;
pub mod template;
pub mod types;

pub use classifier::SegmentClassifier;
pub use engine::{
    split_document, DegradationEngine, DegradationReport, DocumentBlock, DocumentExtraction,
    StrategyAttempt,
};
pub use error::{ExtractError, Result};
pub use integrity::{
    HealthStatus, IntegrityCheckResult, IntegrityChecker, IntegrityIssue, IntegrityMetrics,
    IssueKind, Severity,
};
pub use patterns::{PatternEntry, PatternLibrary, LIBRARY_VERSION};
pub use repair::{
    FormatAction, RepairAdvisor, RepairAnalysis, RepairPriority, RepairResult, RepairStep,
    RepairSuggestion, RepairTarget,
};
pub use template::{CacheConfig, CompiledTemplate, TemplateCompiler};
pub use types::{
    ContentSegment, ExtractionResult, FieldMap, SegmentKind, StrategyKind, Template,
    FIELD_ANSWER, FIELD_NOTES, FIELD_QUESTION, FIELD_TAGS,
};
