//! Repair advisor: turns detected defects into reviewable, optionally
//! auto-appliable fix suggestions.
//!
//! Analysis draws from four sources: format scans over the content,
//! structural scans, integrity issues passed in, and template-match-failure
//! diagnosis. Application never aborts on a single bad suggestion; errors
//! accumulate per step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::integrity::{IntegrityIssue, IssueKind};
use crate::template::TemplateCompiler;
use crate::types::{FieldMap, Template};

/// Quick fixes need at least this confidence (and an auto-fixable flag).
const QUICK_FIX_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPriority {
    High,
    Medium,
    Low,
}

/// Where a repair step applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairTarget {
    Field { name: String },
    /// 0-based line index into the content.
    Line { index: usize },
    WholeContent,
}

/// Mechanical normalizations a Format step can carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatAction {
    StripControlChars,
    NormalizeUnicode,
    CollapseWhitespace,
    NormalizeHeadingSpace,
    UnifyPunctuation,
}

/// One concrete edit inside a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RepairStep {
    Replace {
        target: RepairTarget,
        to: String,
        automated: bool,
    },
    Insert {
        target: RepairTarget,
        text: String,
        automated: bool,
    },
    Delete {
        target: RepairTarget,
        automated: bool,
    },
    Format {
        target: RepairTarget,
        action: FormatAction,
        automated: bool,
    },
}

impl RepairStep {
    fn automated(&self) -> bool {
        match self {
            Self::Replace { automated, .. }
            | Self::Insert { automated, .. }
            | Self::Delete { automated, .. }
            | Self::Format { automated, .. } => *automated,
        }
    }
}

/// A ranked, previewable repair proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairSuggestion {
    /// Deterministic kebab-case identifier, stable across runs.
    pub id: String,
    pub priority: RepairPriority,
    pub auto_fixable: bool,
    pub confidence: f64,
    pub description: String,
    pub preview_before: String,
    pub preview_after: String,
    pub steps: Vec<RepairStep>,
}

/// Analysis output, partitioned by how safely a fix can be applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAnalysis {
    pub quick_fixes: Vec<RepairSuggestion>,
    pub complex_fixes: Vec<RepairSuggestion>,
}

impl RepairAnalysis {
    /// All suggestions in rank order, quick fixes first.
    pub fn all(&self) -> impl Iterator<Item = &RepairSuggestion> {
        self.quick_fixes.iter().chain(self.complex_fixes.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.quick_fixes.is_empty() && self.complex_fixes.is_empty()
    }
}

/// Outcome of applying suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairResult {
    pub modified_content: String,
    pub modified_fields: FieldMap,
    pub applied_suggestions: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub needs_manual_review: bool,
}

/// Synthesizes and applies repair suggestions.
pub struct RepairAdvisor {
    compiler: Arc<TemplateCompiler>,
}

impl Default for RepairAdvisor {
    fn default() -> Self {
        Self::new(Arc::new(TemplateCompiler::default()))
    }
}

impl RepairAdvisor {
    /// Share the compiler with the extraction engine so template diagnosis
    /// hits the same cache.
    pub fn new(compiler: Arc<TemplateCompiler>) -> Self {
        Self { compiler }
    }

    /// Produce a ranked, partitioned list of repair suggestions.
    pub fn analyze(
        &self,
        original: &str,
        fields: &FieldMap,
        template: Option<&Template>,
        issues: &[IntegrityIssue],
    ) -> RepairAnalysis {
        let mut suggestions = Vec::new();

        self.scan_format(original, &mut suggestions);
        self.scan_structure(original, &mut suggestions);
        self.map_issues(fields, issues, &mut suggestions);
        if let Some(template) = template {
            self.diagnose_template(original, template, &mut suggestions);
        }

        // Rank: priority first, then confidence.
        suggestions.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });

        let (quick_fixes, complex_fixes): (Vec<_>, Vec<_>) = suggestions
            .into_iter()
            .partition(|s| s.auto_fixable && s.confidence > QUICK_FIX_CONFIDENCE);

        RepairAnalysis {
            quick_fixes,
            complex_fixes,
        }
    }

    /// Apply suggestions in rank order.
    ///
    /// With `auto_fix_only`, steps flagged `automated: false` are skipped and
    /// left for a human. A failing step records an error and the walk
    /// continues.
    pub fn apply(
        &self,
        content: &str,
        fields: &FieldMap,
        suggestions: &[RepairSuggestion],
        auto_fix_only: bool,
    ) -> RepairResult {
        let mut ordered: Vec<&RepairSuggestion> = suggestions.iter().collect();
        ordered.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });

        let mut result = RepairResult {
            modified_content: content.to_string(),
            modified_fields: fields.clone(),
            applied_suggestions: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            needs_manual_review: false,
        };

        for suggestion in ordered {
            if suggestion.steps.is_empty() {
                result.needs_manual_review = true;
                result
                    .warnings
                    .push(format!("'{}' requires manual review", suggestion.id));
                continue;
            }

            let mut applied_any = false;
            for step in &suggestion.steps {
                if auto_fix_only && !step.automated() {
                    result.needs_manual_review = true;
                    result.warnings.push(format!(
                        "skipped non-automated step of '{}'",
                        suggestion.id
                    ));
                    continue;
                }

                match apply_step(
                    &mut result.modified_content,
                    &mut result.modified_fields,
                    step,
                ) {
                    Ok(()) => applied_any = true,
                    Err(message) => {
                        result.needs_manual_review = true;
                        result
                            .errors
                            .push(format!("'{}': {message}", suggestion.id));
                    }
                }
            }

            if applied_any {
                result.applied_suggestions.push(suggestion.id.clone());
            }
        }

        result
    }

    /// Source 1: mechanical format defects in the content.
    fn scan_format(&self, content: &str, suggestions: &mut Vec<RepairSuggestion>) {
        let candidates = [
            (
                "normalize-heading-space",
                FormatAction::NormalizeHeadingSpace,
                "insert the missing space after heading markers",
                0.9,
            ),
            (
                "unify-punctuation",
                FormatAction::UnifyPunctuation,
                "unify full-width marker punctuation to ASCII",
                0.85,
            ),
            (
                "collapse-whitespace",
                FormatAction::CollapseWhitespace,
                "collapse runs of blank lines and trailing spaces",
                0.9,
            ),
        ];

        for (id, action, description, confidence) in candidates {
            let after = run_format_action(content, action);
            if after != content {
                suggestions.push(RepairSuggestion {
                    id: id.to_string(),
                    priority: RepairPriority::Medium,
                    auto_fixable: true,
                    confidence,
                    description: description.to_string(),
                    preview_before: content.to_string(),
                    preview_after: after,
                    steps: vec![RepairStep::Format {
                        target: RepairTarget::WholeContent,
                        action,
                        automated: true,
                    }],
                });
            }
        }
    }

    /// Source 2: missing card structure.
    fn scan_structure(&self, content: &str, suggestions: &mut Vec<RepairSuggestion>) {
        let lines: Vec<&str> = content.lines().collect();
        let non_empty = lines.iter().filter(|l| !l.trim().is_empty()).count();
        if non_empty == 0 {
            return;
        }

        let has_heading = lines.iter().any(|l| is_heading_line(l));
        if !has_heading {
            let first = lines
                .iter()
                .find(|l| !l.trim().is_empty())
                .copied()
                .unwrap_or("");
            let index = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(0);
            suggestions.push(RepairSuggestion {
                id: "add-heading".to_string(),
                priority: RepairPriority::Medium,
                auto_fixable: false,
                confidence: 0.6,
                description: "promote the first line to a heading so the question is explicit"
                    .to_string(),
                preview_before: first.to_string(),
                preview_after: format!("## {}", first.trim()),
                steps: vec![RepairStep::Replace {
                    target: RepairTarget::Line { index },
                    to: format!("## {}", first.trim()),
                    automated: false,
                }],
            });
        }

        if non_empty >= 2 && !content.contains("\n\n") {
            suggestions.push(RepairSuggestion {
                id: "separate-question-answer".to_string(),
                priority: RepairPriority::Low,
                auto_fixable: false,
                confidence: 0.5,
                description: "insert a blank line between question and answer".to_string(),
                preview_before: lines[..lines.len().min(2)].join("\n"),
                preview_after: format!("{}\n", lines[0]),
                steps: vec![RepairStep::Insert {
                    target: RepairTarget::Line { index: 1 },
                    text: String::new(),
                    automated: false,
                }],
            });
        }
    }

    /// Source 3: issues reported by the integrity checker.
    fn map_issues(
        &self,
        fields: &FieldMap,
        issues: &[IntegrityIssue],
        suggestions: &mut Vec<RepairSuggestion>,
    ) {
        for issue in issues {
            match issue.kind {
                IssueKind::DataLoss | IssueKind::Inconsistency => {
                    let Some(expected) = &issue.expected else {
                        suggestions.push(manual_review_suggestion(issue));
                        continue;
                    };
                    let before = fields.get(&issue.field).cloned().unwrap_or_default();
                    suggestions.push(RepairSuggestion {
                        id: format!("restore-{}", issue.field),
                        priority: RepairPriority::High,
                        auto_fixable: issue.auto_fixable,
                        confidence: 0.95,
                        description: format!(
                            "restore field '{}' from the original text",
                            issue.field
                        ),
                        preview_before: before,
                        preview_after: expected.clone(),
                        steps: vec![RepairStep::Replace {
                            target: RepairTarget::Field {
                                name: issue.field.clone(),
                            },
                            to: expected.clone(),
                            automated: issue.auto_fixable,
                        }],
                    });
                }
                IssueKind::FormatError => {
                    let action = if issue.detected.contains("control") {
                        FormatAction::StripControlChars
                    } else {
                        FormatAction::NormalizeUnicode
                    };
                    let before = fields.get(&issue.field).cloned().unwrap_or_default();
                    let after = run_format_action(&before, action);
                    suggestions.push(RepairSuggestion {
                        id: format!(
                            "{}-{}",
                            match action {
                                FormatAction::StripControlChars => "strip-control-chars",
                                _ => "nfc-normalize",
                            },
                            issue.field
                        ),
                        priority: RepairPriority::Medium,
                        auto_fixable: true,
                        confidence: 0.9,
                        description: issue.detected.clone(),
                        preview_before: before,
                        preview_after: after,
                        steps: vec![RepairStep::Format {
                            target: RepairTarget::Field {
                                name: issue.field.clone(),
                            },
                            action,
                            automated: true,
                        }],
                    });
                }
                // Never auto-overwrite on a checksum mismatch alone.
                IssueKind::ChecksumMismatch | IssueKind::Corruption => {
                    suggestions.push(manual_review_suggestion(issue));
                }
            }
        }
    }

    /// Source 4: explain why a template's pattern does not match.
    fn diagnose_template(
        &self,
        content: &str,
        template: &Template,
        suggestions: &mut Vec<RepairSuggestion>,
    ) {
        let compiled = match self.compiler.get_compiled(template) {
            Ok(compiled) => compiled,
            Err(e) => {
                suggestions.push(RepairSuggestion {
                    id: "fix-template-pattern".to_string(),
                    priority: RepairPriority::Low,
                    auto_fixable: false,
                    confidence: 0.3,
                    description: format!("template pattern does not compile: {e}"),
                    preview_before: template.pattern.clone(),
                    preview_after: String::new(),
                    steps: Vec::new(),
                });
                return;
            }
        };

        if compiled.matcher.is_match(content) {
            return;
        }

        let expects_heading = template.pattern.contains('#');
        let has_heading = content.lines().any(is_heading_line);

        if expects_heading && !has_heading {
            let first = content
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("")
                .trim();
            suggestions.push(RepairSuggestion {
                id: "match-template-heading".to_string(),
                priority: RepairPriority::Medium,
                auto_fixable: false,
                confidence: 0.65,
                description: format!(
                    "template '{}' expects a heading marker but none was found",
                    template.name
                ),
                preview_before: first.to_string(),
                preview_after: format!("## {first}"),
                steps: vec![RepairStep::Replace {
                    target: RepairTarget::Line { index: 0 },
                    to: format!("## {first}"),
                    automated: false,
                }],
            });
        } else {
            suggestions.push(RepairSuggestion {
                id: "review-template-mismatch".to_string(),
                priority: RepairPriority::Low,
                auto_fixable: false,
                confidence: 0.4,
                description: format!(
                    "content does not match template '{}'; review the pattern or the note layout",
                    template.name
                ),
                preview_before: content.lines().next().unwrap_or("").to_string(),
                preview_after: String::new(),
                steps: Vec::new(),
            });
        }
    }
}

fn manual_review_suggestion(issue: &IntegrityIssue) -> RepairSuggestion {
    RepairSuggestion {
        id: format!("review-{}-{}", issue_kind_slug(issue.kind), issue.field),
        priority: RepairPriority::Low,
        auto_fixable: false,
        confidence: 0.4,
        description: issue
            .suggestion
            .clone()
            .unwrap_or_else(|| issue.detected.clone()),
        preview_before: issue.detected.clone(),
        preview_after: String::new(),
        steps: Vec::new(),
    }
}

fn issue_kind_slug(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::DataLoss => "data-loss",
        IssueKind::Inconsistency => "inconsistency",
        IssueKind::FormatError => "format-error",
        IssueKind::ChecksumMismatch => "checksum-mismatch",
        IssueKind::Corruption => "corruption",
    }
}

/// Apply one step to the working content/fields.
fn apply_step(
    content: &mut String,
    fields: &mut FieldMap,
    step: &RepairStep,
) -> std::result::Result<(), String> {
    match step {
        RepairStep::Replace { target, to, .. } => match target {
            RepairTarget::Field { name } => {
                fields.insert(name.clone(), to.clone());
                Ok(())
            }
            RepairTarget::Line { index } => with_line(content, *index, |lines, i| {
                lines[i] = to.clone();
            }),
            RepairTarget::WholeContent => {
                *content = to.clone();
                Ok(())
            }
        },
        RepairStep::Insert { target, text, .. } => match target {
            RepairTarget::Field { name } => {
                let entry = fields.entry(name.clone()).or_default();
                if entry.is_empty() {
                    *entry = text.clone();
                } else {
                    entry.push('\n');
                    entry.push_str(text);
                }
                Ok(())
            }
            RepairTarget::Line { index } => {
                let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
                if *index > lines.len() {
                    return Err(format!("line {index} out of range for insert"));
                }
                lines.insert(*index, text.clone());
                *content = lines.join("\n");
                Ok(())
            }
            RepairTarget::WholeContent => {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(text);
                Ok(())
            }
        },
        RepairStep::Delete { target, .. } => match target {
            RepairTarget::Field { name } => {
                fields.remove(name);
                Ok(())
            }
            RepairTarget::Line { index } => with_line(content, *index, |lines, i| {
                lines.remove(i);
            }),
            RepairTarget::WholeContent => {
                content.clear();
                Ok(())
            }
        },
        RepairStep::Format { target, action, .. } => match target {
            RepairTarget::Field { name } => {
                if let Some(value) = fields.get_mut(name) {
                    *value = run_format_action(value, *action);
                    Ok(())
                } else {
                    Err(format!("field '{name}' not present for format"))
                }
            }
            RepairTarget::Line { index } => with_line(content, *index, |lines, i| {
                let formatted = run_format_action(&lines[i], *action);
                lines[i] = formatted;
            }),
            RepairTarget::WholeContent => {
                *content = run_format_action(content, *action);
                Ok(())
            }
        },
    }
}

fn with_line(
    content: &mut String,
    index: usize,
    edit: impl FnOnce(&mut Vec<String>, usize),
) -> std::result::Result<(), String> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    if index >= lines.len() {
        return Err(format!("line {index} out of range"));
    }
    edit(&mut lines, index);
    *content = lines.join("\n");
    Ok(())
}

/// Run one mechanical normalization over a string.
pub fn run_format_action(text: &str, action: FormatAction) -> String {
    match action {
        FormatAction::StripControlChars => text
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
            .collect(),
        FormatAction::NormalizeUnicode => text.nfc().collect(),
        FormatAction::CollapseWhitespace => collapse_whitespace(text),
        FormatAction::NormalizeHeadingSpace => text
            .lines()
            .map(normalize_heading_space)
            .collect::<Vec<_>>()
            .join("\n"),
        FormatAction::UnifyPunctuation => text
            .lines()
            .map(unify_marker_punctuation)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    while out.contains("\n\n\n") {
        out = out.replace("\n\n\n", "\n\n");
    }
    out
}

fn normalize_heading_space(line: &str) -> String {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &line[hashes..];
        if !rest.is_empty() && !rest.starts_with(' ') {
            return format!("{} {}", &line[..hashes], rest);
        }
    }
    line.to_string()
}

/// Replace a full-width colon after a Q/A marker prefix with an ASCII colon.
/// Punctuation inside the body text is left alone.
fn unify_marker_punctuation(line: &str) -> String {
    const MARKERS: &[&str] = &["Q", "A", "q", "a", "问题", "答案", "问", "答"];
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    for marker in MARKERS {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            if let Some(body) = rest.strip_prefix('：') {
                return format!("{indent}{marker}:{body}");
            }
        }
    }
    line.to_string()
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::{IntegrityChecker, Severity};
    use pretty_assertions::assert_eq;

    fn fields(entries: &[(&str, &str)]) -> FieldMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn heading_space_scan_proposes_quick_fix() {
        let advisor = RepairAdvisor::default();
        let analysis = advisor.analyze("##Question?\nAnswer.", &FieldMap::new(), None, &[]);

        let fix = analysis
            .quick_fixes
            .iter()
            .find(|s| s.id == "normalize-heading-space")
            .expect("heading space fix");
        assert!(fix.auto_fixable);
        assert!(fix.preview_after.starts_with("## Question?"));
    }

    #[test]
    fn punctuation_scan_targets_marker_lines_only() {
        let after = run_format_action("问：什么？\n正文：保持原样", FormatAction::UnifyPunctuation);
        assert_eq!(after, "问:什么？\n正文：保持原样");
    }

    #[test]
    fn whitespace_scan_collapses_blank_runs() {
        let after = run_format_action("a   \n\n\n\nb", FormatAction::CollapseWhitespace);
        assert_eq!(after, "a\n\nb");
    }

    #[test]
    fn structure_scan_flags_missing_heading_as_complex() {
        let advisor = RepairAdvisor::default();
        let analysis = advisor.analyze("plain first line\nsecond line", &FieldMap::new(), None, &[]);

        let fix = analysis
            .complex_fixes
            .iter()
            .find(|s| s.id == "add-heading")
            .expect("add-heading suggestion");
        assert!(!fix.auto_fixable);
        assert_eq!(fix.preview_after, "## plain first line");
    }

    #[test]
    fn scenario_d_restore_suggestion_round_trips() {
        let checker = IntegrityChecker::new();
        let advisor = RepairAdvisor::default();
        let card_fields = fields(&[("notes", "wrong text"), ("question", "q"), ("answer", "a")]);
        let original = "correct text";

        let check = checker.check("card-1", &card_fields, Some(original));
        let analysis = advisor.analyze(original, &card_fields, None, &check.issues);

        let restore = analysis
            .quick_fixes
            .iter()
            .find(|s| s.id == "restore-notes")
            .expect("restore suggestion");
        assert_eq!(restore.preview_after, "correct text");
        assert_eq!(restore.priority, RepairPriority::High);

        let suggestions: Vec<RepairSuggestion> = analysis.all().cloned().collect();
        let result = advisor.apply(original, &card_fields, &suggestions, true);
        assert_eq!(result.modified_fields["notes"], "correct text");
        assert!(result
            .applied_suggestions
            .contains(&"restore-notes".to_string()));
    }

    #[test]
    fn checksum_mismatch_yields_review_only_suggestion() {
        let advisor = RepairAdvisor::default();
        let issue = IntegrityIssue {
            kind: IssueKind::ChecksumMismatch,
            severity: Severity::Medium,
            field: "notes".to_string(),
            detected: "notes checksum differs from original text".to_string(),
            expected: None,
            auto_fixable: false,
            suggestion: None,
        };
        let card_fields = fields(&[("notes", "mine")]);
        let analysis = advisor.analyze("mine", &card_fields, None, &[issue]);

        let review = analysis
            .complex_fixes
            .iter()
            .find(|s| s.id == "review-checksum-mismatch-notes")
            .expect("review suggestion");
        assert!(review.steps.is_empty());

        // Applying must not touch anything and must flag manual review.
        let suggestions: Vec<RepairSuggestion> = analysis.all().cloned().collect();
        let result = advisor.apply("mine", &card_fields, &suggestions, true);
        assert_eq!(result.modified_fields["notes"], "mine");
        assert!(result.needs_manual_review);
    }

    #[test]
    fn template_mismatch_explains_missing_heading() {
        let advisor = RepairAdvisor::default();
        let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
        let analysis = advisor.analyze(
            "no heading here\nanswer line",
            &FieldMap::new(),
            Some(&template),
            &[],
        );

        let diagnosis = analysis
            .complex_fixes
            .iter()
            .find(|s| s.id == "match-template-heading")
            .expect("diagnosis");
        assert!(diagnosis.description.contains("heading"));
        assert_eq!(diagnosis.preview_after, "## no heading here");
    }

    #[test]
    fn matching_template_produces_no_diagnosis() {
        let advisor = RepairAdvisor::default();
        let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
        let analysis = advisor.analyze(
            "## Fine?\nAll good.",
            &FieldMap::new(),
            Some(&template),
            &[],
        );
        assert!(!analysis.all().any(|s| s.id.starts_with("match-template")
            || s.id.starts_with("review-template")));
    }

    #[test]
    fn broken_template_is_reported_not_crashed() {
        let advisor = RepairAdvisor::default();
        let template = Template::question_answer("broken", r"([unclosed");
        let analysis = advisor.analyze("text", &FieldMap::new(), Some(&template), &[]);
        assert!(analysis.all().any(|s| s.id == "fix-template-pattern"));
    }

    #[test]
    fn auto_fix_only_skips_manual_steps() {
        let advisor = RepairAdvisor::default();
        let suggestion = RepairSuggestion {
            id: "add-heading".to_string(),
            priority: RepairPriority::Medium,
            auto_fixable: false,
            confidence: 0.6,
            description: String::new(),
            preview_before: String::new(),
            preview_after: String::new(),
            steps: vec![RepairStep::Replace {
                target: RepairTarget::Line { index: 0 },
                to: "## heading".to_string(),
                automated: false,
            }],
        };

        let result = advisor.apply("original line", &FieldMap::new(), &[suggestion.clone()], true);
        assert_eq!(result.modified_content, "original line");
        assert!(result.needs_manual_review);
        assert!(result.applied_suggestions.is_empty());

        let result = advisor.apply("original line", &FieldMap::new(), &[suggestion], false);
        assert_eq!(result.modified_content, "## heading");
        assert!(!result.needs_manual_review);
    }

    #[test]
    fn failing_step_records_error_and_continues() {
        let advisor = RepairAdvisor::default();
        let bad = RepairSuggestion {
            id: "out-of-range".to_string(),
            priority: RepairPriority::High,
            auto_fixable: true,
            confidence: 0.9,
            description: String::new(),
            preview_before: String::new(),
            preview_after: String::new(),
            steps: vec![RepairStep::Delete {
                target: RepairTarget::Line { index: 99 },
                automated: true,
            }],
        };
        let good = RepairSuggestion {
            id: "set-field".to_string(),
            priority: RepairPriority::Low,
            auto_fixable: true,
            confidence: 0.9,
            description: String::new(),
            preview_before: String::new(),
            preview_after: String::new(),
            steps: vec![RepairStep::Replace {
                target: RepairTarget::Field {
                    name: "question".to_string(),
                },
                to: "fixed".to_string(),
                automated: true,
            }],
        };

        let result = advisor.apply("one line", &FieldMap::new(), &[bad, good], true);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.modified_fields["question"], "fixed");
        assert!(result.needs_manual_review);
    }

    #[test]
    fn quick_fixes_sorted_before_being_partitioned() {
        let checker = IntegrityChecker::new();
        let advisor = RepairAdvisor::default();
        let card_fields = fields(&[("notes", ""), ("question", "q"), ("answer", "a")]);
        let check = checker.check("card-1", &card_fields, Some("##bad heading"));
        let analysis = advisor.analyze("##bad heading", &card_fields, None, &check.issues);

        // restore-notes (High, 0.95) must rank before the format fixes.
        assert_eq!(analysis.quick_fixes.first().map(|s| s.id.as_str()), Some("restore-notes"));
    }
}
