//! Segment classifier: splits raw text into paragraph-like segments and
//! assigns each a provisional kind with a confidence score.
//!
//! Pure function of the input text and the static pattern table — no side
//! effects, safe to recompute on demand.

use crate::patterns::{PatternEntry, PatternLibrary};
use crate::types::{ContentSegment, SegmentKind};

/// Minimum weighted score for a pattern-based classification to win.
const SCORE_FLOOR: f64 = 0.3;
/// Segments shorter than this lean Question under the heuristic rules.
const SHORT_SEGMENT_CHARS: usize = 100;
/// Segments longer than this lean Answer under the heuristic rules.
const LONG_SEGMENT_CHARS: usize = 200;
/// Added to the Question score of the first segment in document order.
const FIRST_SEGMENT_BONUS: f64 = 0.15;

/// Classifies text segments against the pattern library.
#[derive(Debug, Default)]
pub struct SegmentClassifier {
    library: PatternLibrary,
}

impl SegmentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific pattern library instead of the builtin table.
    pub fn with_library(library: PatternLibrary) -> Self {
        Self { library }
    }

    /// Split `text` on blank-line boundaries and classify each segment.
    ///
    /// Segments preserve document order and byte offsets into `text`.
    pub fn classify(&self, text: &str) -> Vec<ContentSegment> {
        let spans = split_spans(text);

        spans
            .iter()
            .enumerate()
            .map(|(idx, &(start, end))| {
                let segment_text = &text[start..end];
                let prev = idx.checked_sub(1).map(|i| &text[spans[i].0..spans[i].1]);
                let next = spans.get(idx + 1).map(|&(s, e)| &text[s..e]);

                self.classify_segment(segment_text, (start, end), idx == 0, prev, next)
            })
            .collect()
    }

    fn classify_segment(
        &self,
        segment: &str,
        span: (usize, usize),
        is_first: bool,
        prev: Option<&str>,
        next: Option<&str>,
    ) -> ContentSegment {
        let mut best: Option<(SegmentKind, f64)> = None;
        let mut features = Vec::new();

        for entry in self.library.entries() {
            let (mut score, mut entry_features) = score_entry(entry, segment, prev, next);
            if entry.kind == SegmentKind::Question && is_first && score > 0.0 {
                score += FIRST_SEGMENT_BONUS;
                entry_features.push("bonus:first-segment".to_string());
            }
            let score = score.min(1.0);

            if score > 0.0 {
                features.extend(entry_features);
            }
            if score > best.map(|(_, s)| s).unwrap_or(0.0) {
                best = Some((entry.kind, score));
            }
        }

        if let Some((kind, score)) = best {
            if score >= SCORE_FLOOR {
                return ContentSegment {
                    kind,
                    text: segment.to_string(),
                    confidence: score,
                    span,
                    features,
                };
            }
        }

        self.classify_heuristic(segment, span, is_first, best)
    }

    /// Fallback rules for segments without a clear pattern signal.
    fn classify_heuristic(
        &self,
        segment: &str,
        span: (usize, usize),
        is_first: bool,
        scored: Option<(SegmentKind, f64)>,
    ) -> ContentSegment {
        let char_len = segment.chars().count();
        let has_code_fence = segment.contains("```");
        let has_list_marker = segment.lines().any(is_list_line);

        let (kind, confidence, feature) = if char_len > LONG_SEGMENT_CHARS
            || has_code_fence
            || has_list_marker
        {
            (SegmentKind::Answer, 0.4, "heuristic:long-or-structured")
        } else if char_len > 0 && char_len < SHORT_SEGMENT_CHARS {
            let bonus = if is_first { FIRST_SEGMENT_BONUS } else { 0.0 };
            (SegmentKind::Question, 0.35 + bonus, "heuristic:short")
        } else {
            // Below every threshold.
            let confidence = scored.map(|(_, s)| s).unwrap_or(0.0);
            (SegmentKind::Unknown, confidence, "heuristic:none")
        };

        ContentSegment {
            kind,
            text: segment.to_string(),
            confidence,
            span,
            features: vec![feature.to_string()],
        }
    }
}

/// Weighted signal score for one pattern entry against one segment.
fn score_entry(
    entry: &PatternEntry,
    segment: &str,
    prev: Option<&str>,
    next: Option<&str>,
) -> (f64, Vec<String>) {
    let lower = segment.to_lowercase();
    let mut features = Vec::new();

    let mut keyword_score: f64 = 0.0;
    for keyword in &entry.keywords {
        if lower.contains(keyword) {
            keyword_score += 0.15;
            features.push(format!("keyword:{keyword}"));
        }
    }
    let keyword_score = keyword_score.min(0.45);

    let mut regex_score: f64 = 0.0;
    for regex in &entry.regexes {
        // Anchored patterns are written per-line; test each line as well as
        // the segment as a whole.
        if regex.is_match(segment) || segment.lines().any(|line| regex.is_match(line)) {
            regex_score += 0.35;
            features.push(format!("regex:{}", regex.as_str()));
        }
    }
    let regex_score = regex_score.min(0.7);

    let mut context_score: f64 = 0.0;
    for keyword in &entry.context_keywords {
        let in_neighbor = [prev, next]
            .iter()
            .flatten()
            .any(|neighbor| neighbor.to_lowercase().contains(keyword));
        if in_neighbor {
            context_score += 0.1;
            features.push(format!("context:{keyword}"));
        }
    }
    let context_score = context_score.min(0.2);

    (
        (keyword_score + regex_score + context_score) * entry.weight,
        features,
    )
}

fn is_list_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("+ "))
    {
        return !rest.trim().is_empty();
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    trimmed[digits.len()..].starts_with(". ") || trimmed[digits.len()..].starts_with(") ")
}

/// Byte spans of blank-line-delimited segments, in document order.
fn split_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0usize;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                spans.push((s, end));
            }
        } else {
            if start.is_none() {
                start = Some(line_start);
            }
            end = line_start + line.trim_end_matches(['\n', '\r']).len();
        }
    }
    if let Some(s) = start {
        spans.push((s, end));
    }

    spans
}
