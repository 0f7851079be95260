//! End-to-end pipeline tests: extraction cascade, integrity checking and
//! repair working together over realistic note content.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use cardbox_core::{
    similarity, DegradationEngine, HealthStatus, IntegrityChecker, IssueKind, RepairAdvisor,
    RepairSuggestion, StrategyKind, Template, TemplateCompiler,
};

#[test]
fn heading_template_extracts_strictly() {
    let engine = DegradationEngine::default();
    let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
    let text = "## What is FSRS?\nFSRS is a scheduling algorithm.\n#algorithm #srs";

    let (result, report) = engine.extract(text, Some(&template));

    assert!(result.success);
    assert_eq!(result.method, StrategyKind::StrictStructural);
    assert_eq!(result.fields["question"], "What is FSRS?");
    assert!(result.fields["answer"].contains("FSRS is a scheduling algorithm."));
    assert!(result.confidence >= 0.8);
    assert_eq!(report.accepted_level, Some(1));
}

#[test]
fn unstructured_line_degrades_to_simple_split() {
    let engine = DegradationEngine::default();
    let (result, report) = engine.extract("FSRS is great.", None);

    assert_eq!(result.fields["question"], "FSRS is great.");
    assert_eq!(result.fields["answer"], "");
    assert_eq!(result.confidence, 0.3);
    assert!(result.degradation_level >= 4);
    assert_eq!(report.accepted_level, Some(result.degradation_level));
}

#[test]
fn empty_input_is_protected_not_raised() {
    let engine = DegradationEngine::default();
    let (result, _) = engine.extract("", None);

    assert!(result.success);
    assert_eq!(result.method, StrategyKind::ProtectiveParsing);
    assert_eq!(result.fields["notes"], "");
    assert!((0.1..=0.2).contains(&result.confidence));
}

#[test]
fn drift_detected_and_repaired() {
    let checker = IntegrityChecker::new();
    let advisor = RepairAdvisor::default();

    let mut fields = cardbox_core::FieldMap::new();
    fields.insert("notes".to_string(), "wrong text".to_string());
    fields.insert("question".to_string(), "q".to_string());
    fields.insert("answer".to_string(), "a".to_string());
    let original = "correct text";

    let check = checker.check("card-7", &fields, Some(original));
    assert_ne!(check.status, HealthStatus::Healthy);
    assert!(check
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::Inconsistency));
    assert!(check.metrics.consistency < 0.9);

    let analysis = advisor.analyze(original, &fields, None, &check.issues);
    let suggestions: Vec<RepairSuggestion> = analysis.all().cloned().collect();
    let result = advisor.apply(original, &fields, &suggestions, true);

    assert_eq!(result.modified_fields["notes"], "correct text");
}

// Property: for any input, the original text is recoverable from the result.
#[test]
fn no_data_loss_across_inputs() {
    let engine = DegradationEngine::default();
    let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");

    let inputs = [
        "",
        "   \n\t\n",
        "single line",
        "## Structured?\nYes, with a body.\n#tag",
        "问: 什么是借用？\n答: 不转移所有权的引用。",
        "Multi\n\nparagraph\n\ncontent with no questions at all, only prose.",
        "```\ncode only\n```",
    ];

    for text in inputs {
        let (result, _) = engine.extract(text, Some(&template));
        assert_eq!(
            result.fields["notes"], text,
            "input must be recoverable: {text:?}"
        );
    }
}

// Property: a strict failure walks levels 2..=6 in order, and the returned
// level is the lowest one that met its threshold.
#[test]
fn monotonic_fallback_ordering() {
    let engine = DegradationEngine::default();
    let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
    let text = "not a heading\nso strict fails here";

    let (result, report) = engine.extract(text, Some(&template));

    let levels: Vec<u8> = report.attempts.iter().map(|a| a.level).collect();
    let walked: Vec<u8> = (1..=result.degradation_level).collect();
    assert_eq!(levels, walked);

    for attempt in &report.attempts[..report.attempts.len() - 1] {
        assert!(
            !attempt.success || attempt.confidence < min_confidence_for(attempt.level),
            "level {} should not have been accepted",
            attempt.level
        );
    }
}

fn min_confidence_for(level: u8) -> f64 {
    [0.8, 0.7, 0.6, 0.5, 0.3, 0.1][(level - 1) as usize]
}

// Property: structurally identical templates share one cache entry.
#[test]
fn cache_determinism_across_calls() {
    let compiler = Arc::new(TemplateCompiler::default());
    let engine = DegradationEngine::new(Arc::clone(&compiler));
    let template_a = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
    let template_b = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");

    let text = "## What is FSRS?\nFSRS is a scheduling algorithm.";
    engine.extract(text, Some(&template_a));
    engine.extract(text, Some(&template_b));

    assert_eq!(compiler.len(), 1);
    let entry = compiler.get_compiled(&template_a).unwrap();
    assert!(entry.use_count >= 3);
}

// Property: confidence bounds hold everywhere; protective parsing is exact.
#[test]
fn confidence_bounds_hold() {
    let engine = DegradationEngine::default();
    let inputs = ["", "x", "What?\nBecause.", "## H?\nbody", "a\nb\nc\nd"];

    for text in inputs {
        let (result, report) = engine.extract(text, None);
        assert!((0.0..=1.0).contains(&result.confidence));
        for attempt in &report.attempts {
            assert!((0.0..=1.0).contains(&attempt.confidence));
        }
        if result.method == StrategyKind::ProtectiveParsing {
            assert!(result.success);
            assert_eq!(result.confidence, 0.2);
        }
    }
}

// Property: auto-fixing twice is a fixed point.
#[test]
fn auto_fix_is_idempotent() {
    let checker = IntegrityChecker::new();
    let mut fields = cardbox_core::FieldMap::new();
    fields.insert("notes".to_string(), "drifted\u{0000} value".to_string());
    fields.insert("question".to_string(), "q".to_string());
    fields.insert("answer".to_string(), "a".to_string());
    let original = "clean original value";

    let first = checker.check("card-1", &fields, Some(original));
    checker.apply_auto_fixes(&mut fields, &first.issues);
    let snapshot = fields.clone();

    let second = checker.check("card-1", &fields, Some(original));
    let applied = checker.apply_auto_fixes(&mut fields, &second.issues);

    assert!(applied.is_empty());
    assert_eq!(fields, snapshot);
}

#[test]
fn multi_card_document_extraction() {
    let engine = DegradationEngine::default();
    let template = Template::question_answer("heading-qa", r"## (.+)\n([\s\S]*)");
    let text = "## First card?\nFirst answer.\n\n---\n\n## Second card?\nSecond answer.\n\n---\n\njust some loose prose";

    let extraction = engine.extract_document(text, Some(&template));

    assert_eq!(extraction.cards.len(), 3);
    assert_eq!(extraction.cards[0].fields["question"], "First card?");
    assert_eq!(extraction.cards[1].fields["question"], "Second card?");
    // The loose block still succeeds, just lower in the cascade.
    assert!(extraction.cards[2].success);
    assert!(extraction.cards[2].degradation_level > 1);

    // Every block's text is recoverable from its card.
    for (block, card) in extraction.blocks.iter().zip(&extraction.cards) {
        assert_eq!(card.fields["notes"], block.text);
    }
}

#[test]
fn extraction_results_serialize_for_telemetry() {
    let engine = DegradationEngine::default();
    let (result, report) = engine.extract("## Q?\nA.", None);

    let result_json = serde_json::to_value(&result).unwrap();
    assert!(result_json.get("confidence").is_some());
    assert!(result_json.get("degradation_level").is_some());

    let report_json = serde_json::to_value(&report).unwrap();
    assert!(report_json.get("attempts").unwrap().is_array());
}

#[test]
fn checksum_primitive_matches_checker_verdict() {
    let checker = IntegrityChecker::new();
    let mut fields = cardbox_core::FieldMap::new();
    let text = "identical text";
    fields.insert("notes".to_string(), text.to_string());
    fields.insert("question".to_string(), "q".to_string());
    fields.insert("answer".to_string(), "a".to_string());

    let result = checker.check("card-1", &fields, Some(text));
    assert!(result.metrics.checksum_match);
    assert_eq!(
        similarity::checksum64(text),
        similarity::checksum64("identical text")
    );
}
