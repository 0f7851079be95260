//! Post-hoc integrity checking: detects drift between stored structured
//! fields and the source text they were extracted from.
//!
//! Each sub-check appends typed issues; one bad field never aborts the rest
//! of the check. Auto-fixing touches only issues marked `auto_fixable`, and a
//! checksum mismatch alone never triggers an automatic overwrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::{is_nfc, UnicodeNormalization};

use crate::similarity::{checksum64, token_overlap};
use crate::types::{FieldMap, FIELD_ANSWER, FIELD_NOTES, FIELD_QUESTION};

/// Similarity below this between `notes` and the original text is drift.
const SIMILARITY_FLOOR: f64 = 0.9;
/// Similarity below this is severe drift.
const SEVERE_SIMILARITY_FLOOR: f64 = 0.5;

/// What kind of defect an issue describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DataLoss,
    Inconsistency,
    FormatError,
    ChecksumMismatch,
    Corruption,
}

/// How urgent an issue is. Ordered so the highest severity can be folded out
/// of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One detected integrity defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// The field the issue was detected in.
    pub field: String,
    /// Human-readable description of what was found.
    pub detected: String,
    /// The value the field should hold, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    pub auto_fixable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Overall verdict of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Aggregate numbers for dashboards and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityMetrics {
    /// Fraction of required fields that are present and non-empty.
    pub completeness: f64,
    /// Token-overlap similarity between `notes` and the original text
    /// (1.0 when no original is available to compare against).
    pub consistency: f64,
    pub checksum_match: bool,
}

/// Everything a single check produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityCheckResult {
    pub card_id: String,
    pub status: HealthStatus,
    pub issues: Vec<IntegrityIssue>,
    pub metrics: IntegrityMetrics,
    pub checked_at: DateTime<Utc>,
}

/// Runs integrity sub-checks over stored fields.
#[derive(Debug, Default)]
pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check `fields` against the original text, when available.
    pub fn check(
        &self,
        card_id: &str,
        fields: &FieldMap,
        original_text: Option<&str>,
    ) -> IntegrityCheckResult {
        let mut issues = Vec::new();

        self.check_required_fields(fields, original_text, &mut issues);
        self.check_similarity(fields, original_text, &mut issues);
        self.check_format(fields, &mut issues);
        self.check_checksum(fields, original_text, &mut issues);

        let status = roll_up(&issues);
        let metrics = self.metrics(fields, original_text);

        if status != HealthStatus::Healthy {
            tracing::debug!(card_id, ?status, issues = issues.len(), "integrity drift detected");
        }

        IntegrityCheckResult {
            card_id: card_id.to_string(),
            status,
            issues,
            metrics,
            checked_at: Utc::now(),
        }
    }

    /// Apply the auto-fixable subset of `issues` to `fields` in place.
    ///
    /// Returns a description of each fix actually applied. Running this twice
    /// over the same fields is a fixed point: the second pass finds nothing
    /// left to change.
    pub fn apply_auto_fixes(
        &self,
        fields: &mut FieldMap,
        issues: &[IntegrityIssue],
    ) -> Vec<String> {
        let mut applied = Vec::new();

        for issue in issues.iter().filter(|i| i.auto_fixable) {
            match issue.kind {
                IssueKind::FormatError => {
                    if let Some(value) = fields.get_mut(&issue.field) {
                        let cleaned = normalize_field(value);
                        if cleaned != *value {
                            *value = cleaned;
                            applied.push(format!("normalized field '{}'", issue.field));
                        }
                    }
                }
                IssueKind::Inconsistency | IssueKind::DataLoss => {
                    if let Some(expected) = &issue.expected {
                        let current = fields.get(&issue.field);
                        if current.map(String::as_str) != Some(expected.as_str()) {
                            fields.insert(issue.field.clone(), expected.clone());
                            applied.push(format!(
                                "restored field '{}' from original text",
                                issue.field
                            ));
                        }
                    }
                }
                // Checksum mismatches and corruption stay with a human.
                IssueKind::ChecksumMismatch | IssueKind::Corruption => {}
            }
        }

        applied
    }

    fn check_required_fields(
        &self,
        fields: &FieldMap,
        original_text: Option<&str>,
        issues: &mut Vec<IntegrityIssue>,
    ) {
        for (field, severity) in [
            (FIELD_NOTES, Severity::Critical),
            (FIELD_QUESTION, Severity::Medium),
            (FIELD_ANSWER, Severity::Medium),
        ] {
            let missing = fields.get(field).map(|v| v.is_empty()).unwrap_or(true);
            if !missing {
                continue;
            }

            // `notes` is restorable when the original text is known.
            let expected = if field == FIELD_NOTES {
                original_text.map(str::to_string)
            } else {
                None
            };
            let auto_fixable = expected.is_some();
            issues.push(IntegrityIssue {
                kind: IssueKind::DataLoss,
                severity,
                field: field.to_string(),
                detected: format!("required field '{field}' is missing or empty"),
                expected,
                auto_fixable,
                suggestion: Some(if auto_fixable {
                    format!("restore '{field}' from the original text")
                } else {
                    format!("re-extract or author '{field}' manually")
                }),
            });
        }
    }

    fn check_similarity(
        &self,
        fields: &FieldMap,
        original_text: Option<&str>,
        issues: &mut Vec<IntegrityIssue>,
    ) {
        let (Some(original), Some(notes)) = (original_text, fields.get(FIELD_NOTES)) else {
            return;
        };
        if notes.is_empty() {
            // Already reported as DataLoss.
            return;
        }

        let similarity = token_overlap(notes, original);
        if similarity < SIMILARITY_FLOOR {
            let severity = if similarity < SEVERE_SIMILARITY_FLOOR {
                Severity::High
            } else {
                Severity::Medium
            };
            issues.push(IntegrityIssue {
                kind: IssueKind::Inconsistency,
                severity,
                field: FIELD_NOTES.to_string(),
                detected: format!(
                    "notes drifted from original text (similarity {similarity:.2})"
                ),
                expected: Some(original.to_string()),
                auto_fixable: true,
                suggestion: Some("restore notes from the original text".to_string()),
            });
        }
    }

    fn check_format(&self, fields: &FieldMap, issues: &mut Vec<IntegrityIssue>) {
        for (field, value) in fields {
            if value.chars().any(is_disallowed_control) {
                issues.push(IntegrityIssue {
                    kind: IssueKind::FormatError,
                    severity: Severity::Low,
                    field: field.clone(),
                    detected: format!("field '{field}' contains control characters"),
                    expected: None,
                    auto_fixable: true,
                    suggestion: Some("strip control characters".to_string()),
                });
            }
            if !is_nfc(value) {
                issues.push(IntegrityIssue {
                    kind: IssueKind::FormatError,
                    severity: Severity::Low,
                    field: field.clone(),
                    detected: format!("field '{field}' is not NFC-normalized"),
                    expected: None,
                    auto_fixable: true,
                    suggestion: Some("apply NFC normalization".to_string()),
                });
            }
            if value.contains('\u{FFFD}') {
                issues.push(IntegrityIssue {
                    kind: IssueKind::Corruption,
                    severity: Severity::High,
                    field: field.clone(),
                    detected: format!(
                        "field '{field}' contains replacement characters from a failed decode"
                    ),
                    expected: None,
                    auto_fixable: false,
                    suggestion: Some("recover the field from a clean source".to_string()),
                });
            }
        }
    }

    fn check_checksum(
        &self,
        fields: &FieldMap,
        original_text: Option<&str>,
        issues: &mut Vec<IntegrityIssue>,
    ) {
        let (Some(original), Some(notes)) = (original_text, fields.get(FIELD_NOTES)) else {
            return;
        };

        if checksum64(notes) != checksum64(original) {
            issues.push(IntegrityIssue {
                kind: IssueKind::ChecksumMismatch,
                severity: Severity::Medium,
                field: FIELD_NOTES.to_string(),
                detected: "notes checksum differs from original text".to_string(),
                expected: None,
                auto_fixable: false,
                suggestion: Some("review the difference before overwriting".to_string()),
            });
        }
    }

    fn metrics(&self, fields: &FieldMap, original_text: Option<&str>) -> IntegrityMetrics {
        let required = [FIELD_NOTES, FIELD_QUESTION, FIELD_ANSWER];
        let present = required
            .iter()
            .filter(|f| fields.get(**f).map(|v| !v.is_empty()).unwrap_or(false))
            .count();

        let (consistency, checksum_match) = match (original_text, fields.get(FIELD_NOTES)) {
            (Some(original), Some(notes)) => (
                token_overlap(notes, original),
                checksum64(notes) == checksum64(original),
            ),
            _ => (1.0, true),
        };

        IntegrityMetrics {
            completeness: present as f64 / required.len() as f64,
            consistency,
            checksum_match,
        }
    }
}

/// Critical wins; High/Medium warn; Low-only issues (cosmetic format fixes)
/// leave the card Healthy.
fn roll_up(issues: &[IntegrityIssue]) -> HealthStatus {
    match issues.iter().map(|i| i.severity).max() {
        Some(Severity::Critical) => HealthStatus::Critical,
        Some(Severity::High) | Some(Severity::Medium) => HealthStatus::Warning,
        Some(Severity::Low) | None => HealthStatus::Healthy,
    }
}

fn is_disallowed_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t' && c != '\r'
}

/// Strip disallowed control characters and NFC-normalize.
fn normalize_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| !is_disallowed_control(*c))
        .collect::<String>()
        .nfc()
        .collect()
}
