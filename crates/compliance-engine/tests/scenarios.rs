//! End-to-end scenarios against the built-in pontoon registries

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use compliance_engine::fields::UnitConversion;
use compliance_engine::{extract, ComplianceEngine};
use pontoon_types::{ComplianceStatus, DesignDocument, FieldSource, FieldValue};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn engine() -> ComplianceEngine {
    ComplianceEngine::builtin().unwrap()
}

fn status(engine: &ComplianceEngine, text: &str, rule: &str) -> ComplianceStatus {
    engine.check_text(text).result(rule).unwrap().status
}

// ============================================================
// Worked scenarios
// ============================================================

#[test]
fn live_load_compound_phrase() {
    let engine = engine();
    let extraction = engine.extract("LIVE LOAD 3.5 kPa OR POINT LOAD 5.0 kN");
    assert_eq!(extraction.value("live_load_uniform"), Some(&FieldValue::Float(3.5)));
    assert_eq!(extraction.value("live_load_point"), Some(&FieldValue::Float(5.0)));
    assert_eq!(
        status(&engine, "LIVE LOAD 3.5 kPa OR POINT LOAD 5.0 kN", "live_load_uniform_min"),
        ComplianceStatus::Compliant
    );
}

#[test]
fn wind_speed_below_minimum_needs_review() {
    let engine = engine();
    let extraction = engine.extract("V100 = 55 m/s");
    assert_eq!(extraction.value("wind_ultimate"), Some(&FieldValue::Int(55)));
    assert_eq!(
        status(&engine, "V100 = 55 m/s", "wind_ultimate_min"),
        ComplianceStatus::Review
    );
}

#[test]
fn missing_cover_is_not_applicable() {
    let engine = engine();
    let report = engine.check_text("PONTOON CONCRETE STRENGTH TO BE 50 MPa");
    let cover = report.field("concrete_cover").unwrap();
    assert!(!cover.present);
    assert_eq!(cover.source, FieldSource::Absent);
    assert_eq!(
        report.result("concrete_cover_min").unwrap().status,
        ComplianceStatus::NotApplicable
    );
}

#[test]
fn cover_between_tiers_is_conditional() {
    assert_eq!(
        status(&engine(), "COVER 58 mm", "concrete_cover_min"),
        ComplianceStatus::Conditional
    );
}

#[test]
fn concurrent_documents_are_independent() {
    let engine = Arc::new(engine());
    let documents = [
        ("a", "COVER 70 mm. V100 = 66 m/s"),
        ("b", "COVER 40 mm. V100 = 50 m/s"),
    ];

    let handles: Vec<_> = documents
        .iter()
        .map(|&(id, text)| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.evaluate_document(&DesignDocument::from_text(id, text)))
        })
        .collect();
    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(reports[0].document_id, "a");
    assert_eq!(
        reports[0].result("concrete_cover_min").unwrap().status,
        ComplianceStatus::Compliant
    );
    assert_eq!(
        reports[1].result("concrete_cover_min").unwrap().status,
        ComplianceStatus::Review
    );
    assert_eq!(
        reports[0].result("wind_ultimate_min").unwrap().status,
        ComplianceStatus::Compliant
    );

    // Same documents evaluated serially give the same reports
    for (report, (id, text)) in reports.iter().zip(documents.iter()) {
        assert_eq!(report, &engine.evaluate_document(&DesignDocument::from_text(id, text)));
    }
}

// ============================================================
// Extraction properties
// ============================================================

#[test]
fn priority_order_beats_position_in_text() {
    let text = "SERVICE WIND V100 = 40 m/s. ULTIMATE WIND SPEED V100 = 57m/s";
    let extraction = engine().extract(text);
    assert_eq!(extraction.value("wind_ultimate"), Some(&FieldValue::Int(57)));
}

#[test]
fn separately_stated_point_load_is_found() {
    let engine = engine();
    let report = engine.check_text("LIVE LOAD 3.0 kPa. DECK POINT LOAD 4.5 kN");
    assert_eq!(
        report.field("live_load_point").unwrap().value,
        Some(FieldValue::Float(4.5))
    );
    assert_eq!(report.missing_required, vec!["wind_ultimate"]);
    assert_eq!(
        report.result("live_load_point_min").unwrap().status,
        ComplianceStatus::Compliant
    );
}

#[test]
fn separate_debris_mat_and_log_notes() {
    let engine = engine();
    let report = engine.check_text("1.2m DEEP DEBRIS MAT. IMPACT FROM 2.0 TONNE LOG");
    assert_eq!(
        report.field("debris_log_mass").unwrap().value,
        Some(FieldValue::Float(2.0))
    );
    for rule in ["debris_mat_depth_min", "debris_log_mass_min"] {
        assert_eq!(
            report.result(rule).unwrap().status,
            ComplianceStatus::Compliant,
            "{}",
            rule
        );
    }
}

#[test]
fn wave_height_converts_and_reverts() {
    let engine = engine();
    let extraction = engine.extract("DESIGN WAVE HEIGHT < 500mm");
    let metres = extraction.value("wave_height").and_then(FieldValue::as_f64).unwrap();
    assert!((metres - 0.5).abs() < 1e-12);

    let spec = engine.fields().field("wave_height").unwrap();
    assert_eq!(spec.conversion, Some(UnitConversion::MillimetresToMetres));
    assert!((UnitConversion::MillimetresToMetres.revert(metres) - 500.0).abs() < 1e-9);
}

#[test]
fn phrase_split_across_pages() {
    let document = DesignDocument {
        id: "two-page".to_string(),
        filename: Some("S-001.pdf".to_string()),
        text_content: vec![
            "NOTES: LIVE LOAD 3.0 kPa OR".to_string(),
            "POINT LOAD 4.5 kN".to_string(),
        ],
    };
    let report = engine().evaluate_document(&document);
    assert_eq!(
        report.field("live_load_point").unwrap().value,
        Some(FieldValue::Float(4.5))
    );
}

#[test]
fn full_general_notes_phrasing() {
    let text = "\
        DEBRIS LOADS = 1.2m DEEP DEBRIS MAT, OR 2.0 TONNE LOG\n\
        CRITICAL FLOTATION/STABILITY CASE = MIN 50 mm\n\
        CRITICAL DECK SLOPE = 1:12 DEG\n\
        COATING MASS NOT LESS THAN 600 g/sqm\n\
        TIMBER DECKING MINIMUM F17\n\
        FIXINGS TO BE 316 GRADE STAINLESS STEEL\n\
        MAX 500mm SCOUR\n\
        MAX OUT-OF-PLANE TOLERANCE OF PILES = 75mm\n\
        UNDRAINED COHESION = 20kPa\n";
    let engine = engine();
    let report = engine.check_text(text);

    assert_eq!(
        report.field("fixings_grade").unwrap().value,
        Some(FieldValue::Text("316 SS".to_string()))
    );
    assert_eq!(
        report.field("deck_slope_max").unwrap().value,
        Some(FieldValue::Ratio {
            antecedent: 1.0,
            consequent: 12.0
        })
    );
    for rule in [
        "debris_mat_depth_min",
        "debris_log_mass_min",
        "freeboard_critical_min",
        "deck_slope_max",
        "steel_galvanizing_min",
        "timber_grade",
        "fixings_grade",
        "scour_allowance_stated",
        "pile_tolerance_max",
        "soil_cohesion_stated",
    ] {
        assert_eq!(
            report.result(rule).unwrap().status,
            ComplianceStatus::Compliant,
            "{}",
            rule
        );
    }
}

#[test]
fn non_required_fields_are_tri_state() {
    let engine = engine();
    let report = engine.check_text("COVER 58 mm");
    for field in &report.extracted_fields {
        assert_eq!(field.present, field.value.is_some(), "{}", field.key);
        if !field.present {
            assert_eq!(field.source, FieldSource::Absent);
        }
    }
}

#[test]
fn removing_a_field_only_changes_its_rules() {
    let engine = engine();
    let full = "COVER 58 mm. V100 = 66 m/s. PONTOON CONCRETE STRENGTH TO BE 40 MPa";
    let without_cover = "V100 = 66 m/s. PONTOON CONCRETE STRENGTH TO BE 40 MPa";

    let a = engine.check_text(full);
    let b = engine.check_text(without_cover);

    for (ra, rb) in a.compliance_results.iter().zip(&b.compliance_results) {
        if ra.field_keys.iter().any(|k| k == "concrete_cover") {
            assert_eq!(rb.status, ComplianceStatus::NotApplicable);
        } else {
            assert_eq!(ra, rb);
        }
    }
}

#[test]
fn overrides_reject_unknown_fields() {
    let engine = engine();
    let mut values = BTreeMap::new();
    values.insert("hull_colour".to_string(), FieldValue::Text("RED".into()));
    assert!(engine.validate_overrides(values).is_err());
}

// ============================================================
// Property tests
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn extraction_is_deterministic(text in "[ -~\n]{0,200}") {
        let engine = engine();
        prop_assert_eq!(engine.extract(&text), engine.extract(&text));
        prop_assert_eq!(engine.check_text(&text), engine.check_text(&text));
    }

    #[test]
    fn arbitrary_text_never_panics(text in "\\PC{0,300}") {
        let engine = engine();
        let report = engine.check_text(&text);
        prop_assert_eq!(report.compliance_results.len(), engine.rules().len());
    }

    #[test]
    fn stated_cover_is_always_judged(cover in 0u32..200) {
        let engine = engine();
        let text = format!("MINIMUM COVER TO THE REINFORCEMENT - {} mm", cover);
        let extraction = extract(&text, engine.fields());
        prop_assert_eq!(extraction.value("concrete_cover"), Some(&FieldValue::Int(cover as i64)));

        let expected = if cover >= 65 {
            ComplianceStatus::Compliant
        } else if cover >= 50 {
            ComplianceStatus::Conditional
        } else {
            ComplianceStatus::Review
        };
        prop_assert_eq!(status(&engine, &text, "concrete_cover_min"), expected);
    }
}
