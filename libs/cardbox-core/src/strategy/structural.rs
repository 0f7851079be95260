//! Template-driven strategies: strict and relaxed structural extraction.

use crate::error::Result;
use crate::similarity::coverage_ratio;
use crate::strategy::{ExtractionContext, ExtractionStrategy};
use crate::types::{ExtractionResult, FieldMap, StrategyKind, Template};

/// Applies the compiled template exactly as authored.
///
/// Confidence is the coverage ratio: the fraction of the original text
/// reproduced by the extracted field values.
pub struct StrictStructural;

impl ExtractionStrategy for StrictStructural {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StrictStructural
    }

    fn min_confidence(&self) -> f64 {
        0.8
    }

    fn attempt(&self, text: &str, ctx: &ExtractionContext<'_>) -> Result<ExtractionResult> {
        let Some(template) = ctx.template else {
            return Ok(ExtractionResult::failure(self.kind()).with_warning("no template provided"));
        };

        match ctx.compiler.get_compiled(template) {
            Ok(compiled) => Ok(apply_matcher(
                &compiled.matcher,
                template,
                text,
                self.kind(),
                1.0,
            )),
            // Compile failures score zero and let the cascade continue.
            Err(e) => Ok(ExtractionResult::failure(self.kind()).with_error(e.to_string())),
        }
    }
}

/// Applies the template with lookarounds stripped and non-greedy quantifiers
/// widened to greedy, tolerating minor formatting drift.
///
/// Confidence is coverage × 0.9: the relaxation trades reliability for reach.
pub struct RelaxedStructural;

impl ExtractionStrategy for RelaxedStructural {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RelaxedStructural
    }

    fn min_confidence(&self) -> f64 {
        0.7
    }

    fn attempt(&self, text: &str, ctx: &ExtractionContext<'_>) -> Result<ExtractionResult> {
        let Some(template) = ctx.template else {
            return Ok(ExtractionResult::failure(self.kind()).with_warning("no template provided"));
        };

        let relaxed = Template {
            name: format!("{}::relaxed", template.name),
            pattern: relax_pattern(&template.pattern),
            flags: template.flags.clone(),
            field_mappings: template.field_mappings.clone(),
        };

        match ctx.compiler.get_compiled(&relaxed) {
            Ok(compiled) => {
                let mut result = apply_matcher(&compiled.matcher, template, text, self.kind(), 0.9);
                if relaxed.pattern != template.pattern {
                    result
                        .warnings
                        .push("pattern relaxed before matching".to_string());
                }
                Ok(result)
            }
            Err(e) => Ok(ExtractionResult::failure(self.kind()).with_error(e.to_string())),
        }
    }
}

/// Map capture groups to fields and score by coverage.
fn apply_matcher(
    matcher: &regex::Regex,
    template: &Template,
    text: &str,
    kind: StrategyKind,
    discount: f64,
) -> ExtractionResult {
    let Some(captures) = matcher.captures(text) else {
        return ExtractionResult::failure(kind).with_warning("template pattern did not match");
    };

    let mut fields = FieldMap::new();
    let mut warnings = Vec::new();
    for (field, group) in &template.field_mappings {
        match captures.get(*group) {
            Some(value) => {
                fields.insert(field.clone(), value.as_str().trim().to_string());
            }
            None => {
                warnings.push(format!("capture group {group} for field '{field}' is empty"));
                fields.insert(field.clone(), String::new());
            }
        }
    }

    let confidence = coverage_ratio(text, fields.values().map(String::as_str)) * discount;
    let mut result = ExtractionResult::success(kind, confidence, fields);
    result.warnings = warnings;
    result
}

/// Rewrite a pattern for tolerant matching: remove lookaround groups and
/// widen non-greedy quantifiers to greedy.
///
/// The output is best-effort; if it no longer compiles, the relaxed attempt
/// scores zero like any other compile failure.
pub fn relax_pattern(pattern: &str) -> String {
    widen_quantifiers(&strip_lookarounds(pattern))
}

fn strip_lookarounds(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }

        if chars[i] == '(' && is_lookaround_at(&chars, i) {
            // Skip to the matching close paren, tracking nesting.
            let mut depth = 0;
            while i < chars.len() {
                match chars[i] {
                    '\\' => i += 1,
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            i += 1;
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}

fn is_lookaround_at(chars: &[char], i: usize) -> bool {
    if chars.get(i + 1) != Some(&'?') {
        return false;
    }
    match chars.get(i + 2) {
        Some('=') | Some('!') => true,
        Some('<') => matches!(chars.get(i + 3), Some('=') | Some('!')),
        _ => false,
    }
}

fn widen_quantifiers(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }

        if chars[i] == '?'
            && i > 0
            && matches!(chars[i - 1], '*' | '+' | '}' | '?')
            // `(?` is group syntax, not a quantified literal.
            && !(chars[i - 1] == '?' && i >= 2 && chars[i - 2] == '(')
        {
            i += 1;
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}
