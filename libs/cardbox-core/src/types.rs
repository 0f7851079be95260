//! Core types for flashcard content extraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name for the question side of a card.
pub const FIELD_QUESTION: &str = "question";
/// Field name for the answer side of a card.
pub const FIELD_ANSWER: &str = "answer";
/// Field name holding the author's original text, verbatim.
pub const FIELD_NOTES: &str = "notes";
/// Field name for harvested hashtag metadata.
pub const FIELD_TAGS: &str = "tags";

/// Extracted fields, keyed by field name.
///
/// Keys come from the closed ambient set (`question`, `answer`, `notes`,
/// `tags`) or from a template's `field_mappings`. A `BTreeMap` keeps field
/// order deterministic for serialization and tests.
pub type FieldMap = BTreeMap<String, String>;

/// Classification assigned to a paragraph-like segment of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Question,
    Answer,
    Separator,
    Metadata,
    Unknown,
}

impl Default for SegmentKind {
    fn default() -> Self {
        Self::Unknown
    }
}

impl SegmentKind {
    /// Lowercase string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Separator => "separator",
            Self::Metadata => "metadata",
            Self::Unknown => "unknown",
        }
    }
}

/// One classified segment of the source text.
///
/// Ephemeral: recomputed on demand, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSegment {
    pub kind: SegmentKind,
    pub text: String,
    /// Classification confidence, 0.0..=1.0.
    pub confidence: f64,
    /// Byte offsets `(start, end)` into the source text.
    pub span: (usize, usize),
    /// Signals that matched, for debugging and audit.
    pub features: Vec<String>,
}

/// A user- or system-authored extraction template.
///
/// Owned by the template store; the core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    /// Regex pattern whose capture groups carry the field values.
    pub pattern: String,
    /// Flag characters understood by the compiler: `i`, `m`, `s`, `x`.
    pub flags: String,
    /// Field name -> 1-based capture group index.
    pub field_mappings: BTreeMap<String, usize>,
}

impl Template {
    /// Convenience constructor for the common question/answer shape.
    pub fn question_answer(name: &str, pattern: &str) -> Self {
        let mut field_mappings = BTreeMap::new();
        field_mappings.insert(FIELD_QUESTION.to_string(), 1);
        field_mappings.insert(FIELD_ANSWER.to_string(), 2);
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            flags: String::new(),
            field_mappings,
        }
    }
}

/// Identifies which strategy produced an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    StrictStructural,
    RelaxedStructural,
    FuzzySegmentMatch,
    SemanticAnalysis,
    SimpleSplit,
    ProtectiveParsing,
}

impl StrategyKind {
    /// Lowercase string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictStructural => "strict_structural",
            Self::RelaxedStructural => "relaxed_structural",
            Self::FuzzySegmentMatch => "fuzzy_segment_match",
            Self::SemanticAnalysis => "semantic_analysis",
            Self::SimpleSplit => "simple_split",
            Self::ProtectiveParsing => "protective_parsing",
        }
    }

    /// Position in the fixed fallback order, 1..=6.
    pub fn level(&self) -> u8 {
        match self {
            Self::StrictStructural => 1,
            Self::RelaxedStructural => 2,
            Self::FuzzySegmentMatch => 3,
            Self::SemanticAnalysis => 4,
            Self::SimpleSplit => 5,
            Self::ProtectiveParsing => 6,
        }
    }
}

/// The outcome of one extraction call. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    /// 0.0..=1.0; a confidence concept, never an exception concept.
    pub confidence: f64,
    pub fields: FieldMap,
    pub method: StrategyKind,
    /// 1..=6, position of `method` in the fallback order.
    pub degradation_level: u8,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// True when the original text was carried verbatim into `fields.notes`
    /// without any structural interpretation.
    pub preserved_content: bool,
}

impl ExtractionResult {
    /// A successful result for the given strategy.
    pub fn success(method: StrategyKind, confidence: f64, fields: FieldMap) -> Self {
        Self {
            success: true,
            confidence,
            fields,
            method,
            degradation_level: method.level(),
            warnings: Vec::new(),
            errors: Vec::new(),
            preserved_content: false,
        }
    }

    /// A failed (zero-confidence) attempt for the given strategy.
    pub fn failure(method: StrategyKind) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            fields: FieldMap::new(),
            method,
            degradation_level: method.level(),
            warnings: Vec::new(),
            errors: Vec::new(),
            preserved_content: false,
        }
    }

    /// Attach a warning, builder-style.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Attach an error message, builder-style.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }
}
