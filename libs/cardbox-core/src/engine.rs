//! Degradation engine: drives the strategy cascade and guarantees that every
//! extraction call produces a result.
//!
//! Failure is a confidence concept here, not an exception concept — no error
//! from an individual strategy escapes `extract`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::strategy::{default_stack, ExtractionContext, ExtractionStrategy};
use crate::template::TemplateCompiler;
use crate::types::{ExtractionResult, FieldMap, StrategyKind, Template, FIELD_NOTES};

/// One recorded strategy attempt, for auditing and regression testing of the
/// strategy ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub level: u8,
    pub strategy: StrategyKind,
    pub success: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Audit trail of a full cascade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationReport {
    pub attempts: Vec<StrategyAttempt>,
    /// The level whose result was accepted, or `None` when the engine fell
    /// through to the best partial result.
    pub accepted_level: Option<u8>,
}

/// A block of a multi-card document, with its position for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentBlock {
    pub text: String,
    /// 1-based line number of the block's first line in the document.
    pub start_line: usize,
}

/// Result of extracting every block of a document independently.
///
/// `cards` and `reports` are parallel to `blocks`.
#[derive(Debug)]
pub struct DocumentExtraction {
    pub blocks: Vec<DocumentBlock>,
    pub cards: Vec<ExtractionResult>,
    pub reports: Vec<DegradationReport>,
}

/// Orchestrates the ordered strategy list.
pub struct DegradationEngine {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    compiler: Arc<TemplateCompiler>,
}

impl Default for DegradationEngine {
    fn default() -> Self {
        Self::new(Arc::new(TemplateCompiler::default()))
    }
}

impl DegradationEngine {
    /// Build an engine around a shared template compiler.
    ///
    /// The compiler is injected rather than global so cache behavior is
    /// testable in isolation and shareable with the repair advisor.
    pub fn new(compiler: Arc<TemplateCompiler>) -> Self {
        Self {
            strategies: default_stack(),
            compiler,
        }
    }

    /// The shared template compiler.
    pub fn compiler(&self) -> &Arc<TemplateCompiler> {
        &self.compiler
    }

    /// Extract structured fields from `text`, degrading through the cascade
    /// until a strategy meets its confidence threshold.
    ///
    /// Always returns a result: the terminal protective level succeeds on any
    /// input, including the empty string.
    pub fn extract(
        &self,
        text: &str,
        template: Option<&Template>,
    ) -> (ExtractionResult, DegradationReport) {
        let ctx = ExtractionContext {
            template,
            compiler: &self.compiler,
        };

        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut best: Option<ExtractionResult> = None;
        let mut accepted: Option<ExtractionResult> = None;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let started_at = Utc::now();
            let timer = Instant::now();
            let outcome = strategy.attempt(text, &ctx);
            let duration_ms = timer.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    attempts.push(StrategyAttempt {
                        level: kind.level(),
                        strategy: kind,
                        success: result.success,
                        confidence: result.confidence,
                        error: None,
                        started_at,
                        duration_ms,
                    });

                    if result.success && result.confidence >= strategy.min_confidence() {
                        accepted = Some(result);
                        break;
                    }
                    let best_confidence = best.as_ref().map(|b| b.confidence).unwrap_or(-1.0);
                    if result.success && result.confidence > best_confidence {
                        best = Some(result);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = kind.as_str(),
                        error = %e,
                        "strategy attempt failed; continuing cascade"
                    );
                    attempts.push(StrategyAttempt {
                        level: kind.level(),
                        strategy: kind,
                        success: false,
                        confidence: 0.0,
                        error: Some(e.to_string()),
                        started_at,
                        duration_ms,
                    });
                }
            }
        }

        let accepted_level = accepted.as_ref().map(|r| r.degradation_level);
        let mut result = accepted
            .or(best)
            .unwrap_or_else(|| protective_fallback(text));

        if accepted_level.is_none() && result.warnings.is_empty() {
            result
                .warnings
                .push("no strategy met its confidence threshold; best partial result returned".to_string());
        }
        finalize(&mut result, text);

        (
            result,
            DegradationReport {
                attempts,
                accepted_level,
            },
        )
    }

    /// Split a multi-card document and extract each block independently.
    ///
    /// No block's extraction depends on another's; a degenerate block can at
    /// worst degrade to protective parsing for that block alone.
    pub fn extract_document(
        &self,
        text: &str,
        template: Option<&Template>,
    ) -> DocumentExtraction {
        let blocks = split_document(text);
        let mut cards = Vec::with_capacity(blocks.len());
        let mut reports = Vec::with_capacity(blocks.len());

        for block in &blocks {
            let (card, report) = self.extract(&block.text, template);
            cards.push(card);
            reports.push(report);
        }

        DocumentExtraction {
            blocks,
            cards,
            reports,
        }
    }
}

/// Last-resort result construction; in practice the protective strategy has
/// already produced this at level 6.
fn protective_fallback(text: &str) -> ExtractionResult {
    let mut fields = FieldMap::new();
    fields.insert(FIELD_NOTES.to_string(), text.to_string());
    let mut result = ExtractionResult::success(StrategyKind::ProtectiveParsing, 0.2, fields);
    result.preserved_content = true;
    result
}

/// Enforce the cross-strategy invariants on the final result: confidence
/// stays in bounds and the original text remains recoverable.
fn finalize(result: &mut ExtractionResult, original: &str) {
    result.confidence = result.confidence.clamp(0.0, 1.0);
    result
        .fields
        .entry(FIELD_NOTES.to_string())
        .or_insert_with(|| original.to_string());
}

/// Split a document into card-sized blocks on horizontal rules and top-level
/// heading boundaries.
///
/// Rule lines separate blocks and are dropped; heading lines start a new
/// block and stay in it. Everything else is preserved byte-for-byte.
pub fn split_document(text: &str) -> Vec<DocumentBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_start = 1usize;

    let flush = |lines: &mut Vec<&str>, start: usize, blocks: &mut Vec<DocumentBlock>| {
        let text = lines.join("\n");
        let trimmed = text.trim_end_matches(['\n', ' ', '\t']);
        if !trimmed.trim().is_empty() {
            blocks.push(DocumentBlock {
                text: trimmed.to_string(),
                start_line: start,
            });
        }
        lines.clear();
    };

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;

        if is_rule_line(line) {
            flush(&mut current, current_start, &mut blocks);
            current_start = line_num + 1;
            continue;
        }

        // Blank lines between blocks belong to neither.
        if current.is_empty() && line.trim().is_empty() {
            continue;
        }

        if is_block_heading(line) && !current.is_empty() {
            flush(&mut current, current_start, &mut blocks);
        }

        if current.is_empty() {
            current_start = line_num;
        }
        current.push(line);
    }
    flush(&mut current, current_start, &mut blocks);

    blocks
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3
        && (trimmed.chars().all(|c| c == '-')
            || trimmed.chars().all(|c| c == '*')
            || trimmed.chars().all(|c| c == '_'))
}

fn is_block_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=2).contains(&hashes) && line[hashes..].starts_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scenario_a_strict_heading_template() {
        let engine = DegradationEngine::default();
        let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
        let text = "## What is FSRS?\nFSRS is a scheduling algorithm.\n#algorithm #cards";

        let (result, report) = engine.extract(text, Some(&template));

        assert!(result.success);
        assert_eq!(result.method, StrategyKind::StrictStructural);
        assert_eq!(result.degradation_level, 1);
        assert_eq!(result.fields["question"], "What is FSRS?");
        assert!(result.fields["answer"].contains("scheduling algorithm"));
        assert!(result.confidence >= 0.8);
        assert_eq!(report.accepted_level, Some(1));
        assert_eq!(report.attempts.len(), 1);
    }

    #[test]
    fn scenario_b_falls_through_to_simple_split() {
        let engine = DegradationEngine::default();
        let (result, report) = engine.extract("FSRS is great.", None);

        assert!(result.success);
        assert_eq!(result.method, StrategyKind::SimpleSplit);
        assert_eq!(result.fields["question"], "FSRS is great.");
        assert_eq!(result.fields["answer"], "");
        assert_eq!(result.confidence, 0.3);
        assert_eq!(report.accepted_level, Some(5));
    }

    #[test]
    fn scenario_c_empty_input_reaches_protective_parsing() {
        let engine = DegradationEngine::default();
        let (result, report) = engine.extract("", None);

        assert!(result.success);
        assert_eq!(result.method, StrategyKind::ProtectiveParsing);
        assert_eq!(result.confidence, 0.2);
        assert_eq!(result.fields["notes"], "");
        assert!(result.preserved_content);
        assert_eq!(report.accepted_level, Some(6));
        assert_eq!(report.attempts.len(), 6);
    }

    #[test]
    fn attempts_are_recorded_in_level_order() {
        let engine = DegradationEngine::default();
        let (_, report) = engine.extract("", None);
        let levels: Vec<u8> = report.attempts.iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn original_text_always_recoverable() {
        let engine = DegradationEngine::default();
        let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");

        for text in [
            "## Q?\nbody",
            "no structure at all",
            "What is this?\nAn answer.",
            "",
        ] {
            let (result, _) = engine.extract(text, Some(&template));
            assert_eq!(result.fields["notes"], text, "notes must mirror input");
        }
    }

    #[test]
    fn compile_failure_does_not_abort_cascade() {
        let engine = DegradationEngine::default();
        let template = Template::question_answer("broken", r"([unclosed");
        let (result, report) = engine.extract("Some text?\nBody.", Some(&template));

        assert!(result.success);
        assert!(result.degradation_level >= 3);
        // The two structural attempts recorded their compile trouble.
        assert!(report.attempts[0].confidence == 0.0);
        assert!(report.attempts[1].confidence == 0.0);
    }

    #[test]
    fn confidence_always_in_bounds() {
        let engine = DegradationEngine::default();
        for text in ["", "x", "What?\nBecause.", "## H\nbody\n#tag"] {
            let (result, _) = engine.extract(text, None);
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[test]
    fn split_document_on_rules_and_headings() {
        let text = "## Card one?\nAnswer one.\n\n---\n\n## Card two?\nAnswer two.\n## Card three?\nAnswer three.";
        let blocks = split_document(text);

        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].text.starts_with("## Card one?"));
        assert_eq!(blocks[1].start_line, 6);
        assert!(blocks[2].text.starts_with("## Card three?"));
    }

    #[test]
    fn split_document_without_separators_is_one_block() {
        let blocks = split_document("just\nsome\nlines");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "just\nsome\nlines");
        assert_eq!(blocks[0].start_line, 1);
    }

    #[test]
    fn split_document_empty() {
        assert!(split_document("").is_empty());
        assert!(split_document("\n\n---\n\n").is_empty());
    }

    #[test]
    fn extract_document_extracts_each_block_independently() {
        let engine = DegradationEngine::default();
        let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
        let text =
            "## First card question?\nA nice long answer sentence.\n\n---\n\nfreeform block with no structure";

        let extraction = engine.extract_document(text, Some(&template));

        assert_eq!(extraction.cards.len(), 2);
        assert_eq!(extraction.cards[0].degradation_level, 1);
        assert!(extraction.cards[1].degradation_level > 1);
        assert_eq!(extraction.blocks.len(), extraction.reports.len());
    }
}
