//! Heuristic strategies: fuzzy segment matching and per-line semantic
//! scoring. Both are template-free and line-oriented.

use crate::error::Result;
use crate::strategy::{ExtractionContext, ExtractionStrategy};
use crate::types::{
    ExtractionResult, FieldMap, StrategyKind, FIELD_ANSWER, FIELD_QUESTION, FIELD_TAGS,
};

/// Interrogative sentence openers. English entries match the first word;
/// Chinese entries match the line prefix since CJK has no word boundary.
const INTERROGATIVES_EN: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "is", "are", "do", "does", "did",
    "can", "could", "should",
];
const INTERROGATIVES_CJK: &[&str] = &["什么", "为什么", "如何", "怎么", "哪", "谁", "是否"];

/// Finds the first line that looks like a question; everything after it
/// becomes the answer.
pub struct FuzzySegmentMatch;

impl ExtractionStrategy for FuzzySegmentMatch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FuzzySegmentMatch
    }

    fn min_confidence(&self) -> f64 {
        0.6
    }

    fn attempt(&self, text: &str, _ctx: &ExtractionContext<'_>) -> Result<ExtractionResult> {
        if text.trim().is_empty() {
            return Ok(ExtractionResult::failure(self.kind()).with_warning("empty content"));
        }

        let lines: Vec<&str> = text.lines().collect();
        let question_idx = lines
            .iter()
            .position(|line| looks_like_question(line.trim()));

        let (question, answer, confidence, warning) = match question_idx {
            Some(idx) => {
                let question = strip_label(lines[idx].trim());
                let answer = lines[idx + 1..].join("\n").trim().to_string();
                (question, answer, 0.6, None)
            }
            None => {
                let first = lines
                    .iter()
                    .position(|line| !line.trim().is_empty())
                    .unwrap_or(0);
                let question = strip_label(lines[first].trim());
                let answer = lines[first + 1..].join("\n").trim().to_string();
                (
                    question,
                    answer,
                    0.4,
                    Some("no question-like line found; first line assumed to be the question"),
                )
            }
        };

        let mut fields = FieldMap::new();
        fields.insert(FIELD_QUESTION.to_string(), question);
        fields.insert(FIELD_ANSWER.to_string(), answer);
        if let Some(tags) = harvest_tags(text) {
            fields.insert(FIELD_TAGS.to_string(), tags);
        }

        let mut result = ExtractionResult::success(self.kind(), confidence, fields);
        if let Some(warning) = warning {
            result.warnings.push(warning.to_string());
        }
        Ok(result)
    }
}

/// Scores every line for question likelihood and promotes the best one.
pub struct SemanticAnalysis;

impl ExtractionStrategy for SemanticAnalysis {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SemanticAnalysis
    }

    fn min_confidence(&self) -> f64 {
        0.5
    }

    fn attempt(&self, text: &str, _ctx: &ExtractionContext<'_>) -> Result<ExtractionResult> {
        if text.trim().is_empty() {
            return Ok(ExtractionResult::failure(self.kind()).with_warning("empty content"));
        }

        let lines: Vec<&str> = text.lines().collect();
        let mut best_idx = 0;
        let mut best_score = f64::MIN;
        for (idx, line) in lines.iter().enumerate() {
            let score = question_likelihood(line.trim());
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        let question = strip_label(lines[best_idx].trim());
        let answer = lines
            .iter()
            .enumerate()
            .filter(|(idx, line)| *idx != best_idx && !line.trim().is_empty())
            .map(|(_, line)| *line)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        let mut fields = FieldMap::new();
        fields.insert(FIELD_QUESTION.to_string(), question);
        fields.insert(FIELD_ANSWER.to_string(), answer);
        if let Some(tags) = harvest_tags(text) {
            fields.insert(FIELD_TAGS.to_string(), tags);
        }

        let confidence = if best_score > 0.3 { 0.5 } else { 0.3 };
        let mut result = ExtractionResult::success(self.kind(), confidence, fields);
        if best_score <= 0.3 {
            result
                .warnings
                .push("no line scored strongly as a question".to_string());
        }
        Ok(result)
    }
}

/// Whether a single line reads as a question: `?`/`？` suffix, interrogative
/// opener, or a heading/bold-labeled line.
pub(crate) fn looks_like_question(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    line.ends_with('?')
        || line.ends_with('？')
        || has_interrogative_prefix(line)
        || is_heading(line)
        || is_bold_label(line)
}

/// Graded question likelihood for a single line, 0.0..=1.0.
pub(crate) fn question_likelihood(line: &str) -> f64 {
    if line.is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.0;
    if line.ends_with('?') || line.ends_with('？') {
        score += 0.5;
    }
    if has_interrogative_prefix(line) {
        score += 0.3;
    }
    if is_heading(line) || is_bold_label(line) {
        score += 0.2;
    }
    if line.chars().count() < 80 {
        score += 0.1;
    }
    score.min(1.0)
}

fn has_interrogative_prefix(line: &str) -> bool {
    let lower = line.to_lowercase();
    let first_word = lower
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric());
    INTERROGATIVES_EN.contains(&first_word)
        || INTERROGATIVES_CJK.iter().any(|w| line.starts_with(w))
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

fn is_bold_label(line: &str) -> bool {
    line.len() > 4 && line.starts_with("**") && line.trim_end_matches([':', '：']).ends_with("**")
}

/// Drop heading/bold markup from a promoted question line.
pub(crate) fn strip_label(line: &str) -> String {
    let line = line.trim();
    if is_heading(line) {
        return line.trim_start_matches('#').trim().to_string();
    }
    if is_bold_label(line) {
        return line
            .trim_matches('*')
            .trim_end_matches([':', '：'])
            .trim()
            .to_string();
    }
    line.to_string()
}

/// Collect `#tag` tokens, space-joined with markers preserved.
pub(crate) fn harvest_tags(text: &str) -> Option<String> {
    let tags: Vec<&str> = text
        .split_whitespace()
        .filter(|token| {
            token.len() > 1
                && token.starts_with('#')
                && token[1..]
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '/'))
        })
        .collect();

    if tags.is_empty() {
        None
    } else {
        Some(tags.join(" "))
    }
}
