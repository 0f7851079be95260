//! Terminal strategies: unconditional split and protective parsing.

use crate::error::Result;
use crate::strategy::{ExtractionContext, ExtractionStrategy};
use crate::types::{
    ExtractionResult, FieldMap, StrategyKind, FIELD_ANSWER, FIELD_NOTES, FIELD_QUESTION,
};

/// First line is the question, everything else is the answer.
pub struct SimpleSplit;

impl ExtractionStrategy for SimpleSplit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SimpleSplit
    }

    fn min_confidence(&self) -> f64 {
        0.3
    }

    fn attempt(&self, text: &str, _ctx: &ExtractionContext<'_>) -> Result<ExtractionResult> {
        // Empty input is handed to protective parsing rather than raised.
        if text.trim().is_empty() {
            return Ok(ExtractionResult::failure(self.kind()).with_warning("empty content"));
        }

        let mut lines = text.lines();
        let question = lines.next().unwrap_or("").trim().to_string();
        let answer = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        let mut fields = FieldMap::new();
        fields.insert(FIELD_QUESTION.to_string(), question);
        fields.insert(FIELD_ANSWER.to_string(), answer);

        Ok(ExtractionResult::success(self.kind(), 0.3, fields)
            .with_warning("unconditional first-line split"))
    }
}

/// The terminal level: preserve everything, annotate the uncertainty.
///
/// Never errors, always returns `success = true` with confidence 0.2 and the
/// original text verbatim in `notes`.
pub struct ProtectiveParsing;

impl ExtractionStrategy for ProtectiveParsing {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProtectiveParsing
    }

    fn min_confidence(&self) -> f64 {
        0.1
    }

    fn attempt(&self, text: &str, ctx: &ExtractionContext<'_>) -> Result<ExtractionResult> {
        let mut fields = FieldMap::new();
        fields.insert(FIELD_NOTES.to_string(), text.to_string());

        // Empty placeholders for every field the template declares, so the
        // stored shape stays consistent with template-extracted cards.
        if let Some(template) = ctx.template {
            for field in template.field_mappings.keys() {
                fields.entry(field.clone()).or_default();
            }
        }

        if let Some(first) = text.lines().find(|line| !line.trim().is_empty()) {
            fields.insert(FIELD_QUESTION.to_string(), first.trim().to_string());
        }

        let mut result = ExtractionResult::success(self.kind(), 0.2, fields);
        result.preserved_content = true;
        result
            .warnings
            .push("original content preserved without structural extraction".to_string());
        Ok(result)
    }
}
