//! Tests for the audit engine.

use std::sync::Arc;

use arrow::{
    array::{RecordBatch, StringArray},
    datatypes::{DataType, Field, Schema},
};

use super::*;
use crate::audit::anomalies::{
    count_iqr_outliers, count_modified_z_outliers, count_z_score_outliers,
};

// ========== Fixtures ==========

fn utf8_batch(columns: Vec<(&str, Vec<Option<&str>>)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
        .collect();
    let arrays: Vec<Arc<dyn arrow::array::Array>> = columns
        .into_iter()
        .map(|(_, values)| Arc::new(StringArray::from(values)) as _)
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("batch")
}

fn single_column_batch(name: &str, values: Vec<Option<&str>>) -> RecordBatch {
    utf8_batch(vec![(name, values)])
}

fn owned_column_batch(name: &str, values: &[String]) -> RecordBatch {
    let refs: Vec<Option<&str>> = values.iter().map(|v| Some(v.as_str())).collect();
    single_column_batch(name, refs)
}

// ========== ColumnProfiler tests ==========

#[test]
fn test_profiler_counts_and_missing() {
    let mut profiler = ColumnProfiler::new();
    profiler.process_chunk(&single_column_batch(
        "city",
        vec![Some("berlin"), None, Some(""), Some("tokyo")],
    ));

    let (profiles, total_rows) = profiler.build_profiles();
    assert_eq!(total_rows, 4);

    let profile = &profiles["city"];
    // Null and empty string both count as missing.
    assert!((profile.missing_percentage - 50.0).abs() < 1e-9);
    assert!(profile.unique_count <= 4);
}

#[test]
fn test_profiler_unique_count_bounded_by_total() {
    let mut profiler = ColumnProfiler::new();
    let values: Vec<String> = (0..500).map(|i| format!("v{}", i % 37)).collect();
    profiler.process_chunk(&owned_column_batch("tag", &values));

    let (profiles, total_rows) = profiler.build_profiles();
    let profile = &profiles["tag"];
    assert_eq!(total_rows, 500);
    assert_eq!(profile.unique_count, 37);
    assert!(profile.unique_count <= total_rows);
    assert!(profile.unique_ratio <= 1.0);
}

#[test]
fn test_profiler_numeric_aggregates() {
    let mut profiler = ColumnProfiler::new();
    profiler.process_chunk(&single_column_batch(
        "score",
        vec![Some("1"), Some("2"), Some("3"), Some("4"), Some("oops")],
    ));

    let (profiles, _) = profiler.build_profiles();
    let numeric = profiles["score"].numeric.as_ref().expect("numeric stats");

    // The unparseable value drops out of the aggregates.
    assert!((numeric.mean - 2.5).abs() < 1e-9);
    assert!((numeric.min - 1.0).abs() < 1e-9);
    assert!((numeric.max - 4.0).abs() < 1e-9);
    assert!((numeric.variance - 1.25).abs() < 1e-9);
    assert!((numeric.median.unwrap() - 2.5).abs() < 1e-9);
}

#[test]
fn test_profiler_chunk_boundary_idempotence() {
    let values: Vec<String> = (0..100).map(|i| format!("{}", i % 13)).collect();

    let mut one_chunk = ColumnProfiler::new();
    one_chunk.process_chunk(&owned_column_batch("n", &values));
    let (profiles_one, rows_one) = one_chunk.build_profiles();

    let mut ten_chunks = ColumnProfiler::new();
    for window in values.chunks(10) {
        ten_chunks.process_chunk(&owned_column_batch("n", window));
    }
    let (profiles_ten, rows_ten) = ten_chunks.build_profiles();

    assert_eq!(rows_one, rows_ten);
    let (a, b) = (&profiles_one["n"], &profiles_ten["n"]);
    assert_eq!(a.unique_count, b.unique_count);
    assert!((a.missing_percentage - b.missing_percentage).abs() < 1e-12);

    let (na, nb) = (a.numeric.as_ref().unwrap(), b.numeric.as_ref().unwrap());
    assert!((na.mean - nb.mean).abs() < 1e-12);
    assert!((na.min - nb.min).abs() < 1e-12);
    assert!((na.max - nb.max).abs() < 1e-12);
    assert!((na.variance - nb.variance).abs() < 1e-9);
}

#[test]
fn test_profiler_type_inference() {
    let mut profiler = ColumnProfiler::new();
    profiler.process_chunk(&utf8_batch(vec![
        ("amount", vec![Some("1.5"), Some("2"), Some("3.25")]),
        (
            "when",
            vec![Some("2024-01-01"), Some("2024-02-02"), Some("2024-03-03")],
        ),
        ("label", vec![Some("red"), Some("green"), Some("blue")]),
        ("empty", vec![None, None, None]),
    ]));

    let (profiles, _) = profiler.build_profiles();
    assert_eq!(profiles["amount"].inferred_type, InferredType::Numeric);
    assert_eq!(profiles["when"].inferred_type, InferredType::Datetime);
    assert_eq!(profiles["label"].inferred_type, InferredType::Categorical);
    assert_eq!(profiles["empty"].inferred_type, InferredType::Unknown);
}

#[test]
fn test_profiler_mixed_types_flag() {
    let mut profiler = ColumnProfiler::new();
    profiler.process_chunk(&utf8_batch(vec![
        ("mixed", vec![Some("1"), Some("2"), Some("abc")]),
        ("pure", vec![Some("1"), Some("2"), Some("3")]),
    ]));

    let (profiles, _) = profiler.build_profiles();
    assert!(profiles["mixed"].mixed_types);
    assert!(!profiles["pure"].mixed_types);
}

#[test]
fn test_profiler_entropy_of_constant_column() {
    let mut profiler = ColumnProfiler::new();
    let values: Vec<String> = std::iter::repeat("only".to_string()).take(100).collect();
    profiler.process_chunk(&owned_column_batch("constant", &values));

    let (profiles, _) = profiler.build_profiles();
    let categorical = &profiles["constant"].categorical;
    assert_eq!(categorical.cardinality, 1);
    assert!(categorical.entropy.abs() < 1e-12);
    assert!(categorical.rare_categories.is_empty());
}

#[test]
fn test_profiler_rare_categories() {
    let mut profiler = ColumnProfiler::new();
    // 98 common values, 2 singletons; 1/100 = 1% < 2% threshold.
    let mut values: Vec<String> = std::iter::repeat("common".to_string()).take(98).collect();
    values.push("stray_a".to_string());
    values.push("stray_b".to_string());
    profiler.process_chunk(&owned_column_batch("cat", &values));

    let (profiles, _) = profiler.build_profiles();
    let categorical = &profiles["cat"].categorical;
    assert_eq!(
        categorical.rare_categories,
        vec!["stray_a".to_string(), "stray_b".to_string()]
    );
}

#[test]
fn test_profiler_top_values() {
    let mut profiler = ColumnProfiler::new();
    profiler.process_chunk(&single_column_batch(
        "fruit",
        vec![
            Some("apple"),
            Some("apple"),
            Some("apple"),
            Some("pear"),
            Some("pear"),
            Some("plum"),
        ],
    ));

    let (profiles, _) = profiler.build_profiles();
    let top = &profiles["fruit"].top_values;
    assert_eq!(top[0], ("apple".to_string(), 3));
    assert_eq!(top[1], ("pear".to_string(), 2));
    assert_eq!(top[2], ("plum".to_string(), 1));
}

#[test]
fn test_profiler_late_column_gets_own_accumulator() {
    let mut profiler = ColumnProfiler::new();
    profiler.process_chunk(&single_column_batch("a", vec![Some("1"), Some("2")]));
    profiler.process_chunk(&utf8_batch(vec![
        ("a", vec![Some("3")]),
        ("b", vec![Some("x")]),
    ]));

    let (profiles, total_rows) = profiler.build_profiles();
    assert_eq!(total_rows, 3);
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles["b"].unique_count, 1);
}

// ========== DistributionShape tests ==========

#[test]
fn test_distribution_classification_order() {
    assert_eq!(
        DistributionShape::classify(0.1, 0.5),
        DistributionShape::ApproximatelyNormal
    );
    assert_eq!(
        DistributionShape::classify(1.2, 0.0),
        DistributionShape::RightSkewed
    );
    assert_eq!(
        DistributionShape::classify(-1.2, 0.0),
        DistributionShape::LeftSkewed
    );
    assert_eq!(
        DistributionShape::classify(0.0, 4.0),
        DistributionShape::HeavyTailed
    );
    assert_eq!(
        DistributionShape::classify(0.0, 2.0),
        DistributionShape::NonNormal
    );
}

#[test]
fn test_right_skewed_sample_classified() {
    let mut profiler = ColumnProfiler::new();
    let mut values: Vec<String> = std::iter::repeat("1".to_string()).take(50).collect();
    values.extend(std::iter::repeat("2".to_string()).take(30));
    values.extend(std::iter::repeat("50".to_string()).take(5));
    profiler.process_chunk(&owned_column_batch("v", &values));

    let (profiles, _) = profiler.build_profiles();
    let numeric = profiles["v"].numeric.as_ref().unwrap();
    assert_eq!(numeric.shape, Some(DistributionShape::RightSkewed));
}

// ========== DuplicateDetector tests ==========

#[test]
fn test_exact_duplicates_scenario() {
    // 4 columns, 100 rows, 10 fully duplicated rows.
    let mut detector = DuplicateDetector::new();

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); 4];
    for i in 0..90 {
        columns[0].push(Some(format!("row{}", i)));
        columns[1].push(Some(format!("{}", i * 2)));
        columns[2].push(Some(format!("x{}", i)));
        columns[3].push(Some(format!("y{}", i)));
    }
    for i in 0..10 {
        columns[0].push(Some(format!("row{}", i)));
        columns[1].push(Some(format!("{}", i * 2)));
        columns[2].push(Some(format!("x{}", i)));
        columns[3].push(Some(format!("y{}", i)));
    }

    let names = ["c0", "c1", "c2", "c3"];
    let batch = utf8_batch(
        names
            .iter()
            .zip(&columns)
            .map(|(name, values)| {
                (
                    *name,
                    values
                        .iter()
                        .map(|v| v.as_deref())
                        .collect::<Vec<Option<&str>>>(),
                )
            })
            .collect(),
    );
    detector.process_chunk(&batch);

    let stats = detector.stats();
    assert_eq!(stats.duplicate_count, 10);
    assert!((stats.duplicate_ratio - 0.1).abs() < 1e-12);
}

#[test]
fn test_no_duplicates_means_zero() {
    let mut detector = DuplicateDetector::new();
    let values: Vec<String> = (0..50).map(|i| format!("unique{}", i)).collect();
    detector.process_chunk(&owned_column_batch("v", &values));

    let stats = detector.stats();
    assert_eq!(stats.duplicate_count, 0);
    assert!(stats.duplicate_ratio.abs() < 1e-12);
}

#[test]
fn test_duplicates_across_chunk_boundaries() {
    let mut detector = DuplicateDetector::new();
    detector.process_chunk(&single_column_batch("v", vec![Some("a"), Some("b")]));
    detector.process_chunk(&single_column_batch("v", vec![Some("a"), Some("c")]));

    let stats = detector.stats();
    assert_eq!(stats.duplicate_count, 1);
}

#[test]
fn test_identical_null_rows_are_duplicates() {
    let mut detector = DuplicateDetector::new();
    detector.process_chunk(&single_column_batch("v", vec![None, None]));

    let stats = detector.stats();
    assert_eq!(stats.duplicate_count, 1);
}

#[test]
fn test_key_column_duplicates() {
    let mut detector = DuplicateDetector::new();
    detector.process_chunk(&utf8_batch(vec![
        (
            "user_email",
            vec![Some("[email protected]"), Some("[email protected]"), Some("[email protected]")],
        ),
        ("note", vec![Some("x"), Some("y"), Some("x")]),
    ]));

    let stats = detector.stats();
    assert_eq!(stats.key_duplicates.get("user_email"), Some(&1));
    // Not identifier-like, so not tracked.
    assert!(!stats.key_duplicates.contains_key("note"));
}

#[test]
fn test_fuzzy_duplicate_pairs() {
    let mut detector = DuplicateDetector::new();
    detector.process_chunk(&single_column_batch(
        "name",
        vec![
            Some("Jonathan Smith"),
            Some("Jonathon Smith"),
            Some("Alice Jones"),
        ],
    ));

    let stats = detector.stats();
    assert_eq!(stats.fuzzy_duplicate_pairs, 1);

    // Memoized: a second call returns the same cached count.
    let again = detector.stats();
    assert_eq!(again.fuzzy_duplicate_pairs, 1);
}

#[test]
fn test_similarity_ratio_bounds() {
    assert!((similarity_ratio("same", "same") - 1.0).abs() < 1e-12);
    assert!(similarity_ratio("abcd", "wxyz") < 0.1);
    assert!((similarity_ratio("", "") - 1.0).abs() < 1e-12);
    assert!(similarity_ratio("abc", "").abs() < 1e-12);

    // Matches the classic diff ratio on a known pair.
    let ratio = similarity_ratio("jonathan smith", "jonathon smith");
    assert!((ratio - 13.0 * 2.0 / 28.0).abs() < 1e-9);
}

// ========== AnomalyDetector tests ==========

fn numeric_batch(name: &str, values: &[f64]) -> RecordBatch {
    let rendered: Vec<String> = values.iter().map(|v| format!("{}", v)).collect();
    owned_column_batch(name, &rendered)
}

#[test]
fn test_reservoir_never_exceeds_cap() {
    let mut detector = AnomalyDetector::new();
    for _ in 0..6 {
        let values: Vec<f64> = (0..5_000).map(|i| i as f64).collect();
        detector.process_chunk_for_sampling(&numeric_batch("v", &values));
        assert!(detector.reservoir_len() <= 10_000);
    }

    let stats = detector.compute_anomalies();
    assert_eq!(stats.sample_size, 10_000);
}

#[test]
fn test_empty_reservoir_yields_zeros() {
    let detector = AnomalyDetector::new();
    let stats = detector.compute_anomalies();
    assert_eq!(stats.anomaly_count, 0);
    assert_eq!(stats.sample_size, 0);
    assert!(stats.anomaly_ratio.abs() < 1e-12);
    assert_eq!(stats.z_score_outliers, 0);
    assert_eq!(stats.modified_z_outliers, 0);
    assert_eq!(stats.iqr_outliers, 0);
}

#[test]
fn test_non_numeric_chunks_are_ignored() {
    let mut detector = AnomalyDetector::new();
    detector.process_chunk_for_sampling(&single_column_batch(
        "text",
        vec![Some("a"), Some("b")],
    ));
    assert_eq!(detector.reservoir_len(), 0);

    // Numeric columns latch on the first chunk that yields any.
    detector.process_chunk_for_sampling(&numeric_batch("v", &[1.0, 2.0]));
    assert_eq!(detector.reservoir_len(), 2);
}

#[test]
fn test_single_outlier_flagged_by_z_and_iqr() {
    let mut values: Vec<f64> = (0..99).map(|i| i as f64).collect();
    values.push(10_000.0);

    let mut detector = AnomalyDetector::new();
    detector.process_chunk_for_sampling(&numeric_batch("value", &values));
    let stats = detector.compute_anomalies();

    assert_eq!(stats.sample_size, 100);
    assert_eq!(stats.z_score_outliers, 1);
    assert_eq!(stats.iqr_outliers, 1);
}

#[test]
fn test_outlier_counts_monotone_in_threshold() {
    let rows: Vec<Vec<f64>> = (0..200)
        .map(|i| vec![f64::from(i % 40), f64::from(i % 7)])
        .collect();

    let strict = count_z_score_outliers(&rows, 3.0);
    let loose = count_z_score_outliers(&rows, 1.0);
    assert!(loose >= strict);

    let strict = count_modified_z_outliers(&rows, 3.5);
    let loose = count_modified_z_outliers(&rows, 1.0);
    assert!(loose >= strict);

    let strict = count_iqr_outliers(&rows, 1.5);
    let loose = count_iqr_outliers(&rows, 0.1);
    assert!(loose >= strict);
}

#[test]
fn test_constant_column_triggers_no_univariate_outliers() {
    let rows: Vec<Vec<f64>> = (0..50).map(|_| vec![7.0]).collect();
    assert_eq!(count_z_score_outliers(&rows, 3.0), 0);
    assert_eq!(count_modified_z_outliers(&rows, 3.5), 0);
    assert_eq!(count_iqr_outliers(&rows, 1.5), 0);
}

#[test]
fn test_isolation_forest_flags_injected_outlier() {
    let mut rows: Vec<Vec<f64>> = (0..200)
        .map(|i| vec![f64::from(i % 10), f64::from(i % 5)])
        .collect();
    rows.push(vec![500.0, -500.0]);

    let forest = IsolationForest::new(200, 0.02, 42);
    let flags = forest.fit_predict(&rows);
    assert!(flags[200]);

    let flagged = flags.iter().filter(|&&f| f).count();
    assert!(flagged <= rows.len() / 10);
}

#[test]
fn test_isolation_forest_is_deterministic() {
    let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![f64::from(i)]).collect();
    let forest = IsolationForest::new(50, 0.02, 42);
    assert_eq!(forest.score(&rows), forest.score(&rows));
}

#[test]
fn test_rows_with_missing_numeric_cells_are_dropped() {
    let mut detector = AnomalyDetector::new();
    detector.process_chunk_for_sampling(&utf8_batch(vec![
        ("a", vec![Some("1"), Some("2"), Some("bad")]),
        ("b", vec![Some("10"), None, Some("30")]),
    ]));

    // Only the first row has every numeric cell parseable.
    assert_eq!(detector.reservoir_len(), 1);
}

// ========== InconsistencyDetector tests ==========

fn profiles_for(batches: &[RecordBatch]) -> std::collections::HashMap<String, ColumnProfile> {
    let mut profiler = ColumnProfiler::new();
    for batch in batches {
        profiler.process_chunk(batch);
    }
    profiler.build_profiles().0
}

#[test]
fn test_mixed_types_issue_reported() {
    let batch = single_column_batch("mix", vec![Some("1"), Some("2"), Some("abc")]);
    let mut detector = InconsistencyDetector::new();
    detector.process_chunk(&batch);

    let issues = detector.evaluate(&profiles_for(&[batch]));
    assert!(issues["mix"][0].contains("Mixed data types"));
}

#[test]
fn test_date_parse_band_flags_partial_dates() {
    let mut values: Vec<String> = (0..50).map(|i| format!("2024-01-{:02}", (i % 28) + 1)).collect();
    values.extend((0..50).map(|i| format!("not a date {}", i)));
    let batch = owned_column_batch("maybe_when", &values);

    let mut detector = InconsistencyDetector::new();
    detector.process_chunk(&batch);
    let issues = detector.evaluate(&profiles_for(&[batch]));

    assert!(issues["maybe_when"]
        .iter()
        .any(|m| m.contains("Inconsistent date formats")));
}

#[test]
fn test_mostly_dates_is_consistent() {
    // 95% parse rate sits outside the 30%-90% band: not flagged.
    let mut values: Vec<String> = (0..95).map(|i| format!("2024-01-{:02}", (i % 28) + 1)).collect();
    values.extend((0..5).map(|i| format!("junk {}", i)));
    let batch = owned_column_batch("when", &values);

    let mut detector = InconsistencyDetector::new();
    detector.process_chunk(&batch);
    let issues = detector.evaluate(&profiles_for(&[batch]));

    assert!(issues
        .get("when")
        .map(|msgs| !msgs.iter().any(|m| m.contains("Inconsistent date formats")))
        .unwrap_or(true));
}

#[test]
fn test_rare_value_concentration() {
    let mut values: Vec<String> = Vec::new();
    for _ in 0..40 {
        values.push("alpha".to_string());
        values.push("beta".to_string());
    }
    for i in 0..25 {
        values.push(format!("stray{}", i));
    }
    let batch = owned_column_batch("cat", &values);

    let mut detector = InconsistencyDetector::new();
    detector.process_chunk(&batch);
    let issues = detector.evaluate(&profiles_for(&[batch]));

    assert!(issues["cat"].iter().any(|m| m.contains("Rare categorical")));
}

// ========== ConsistencyChecker tests ==========

#[test]
fn test_email_violation_scenario() {
    // 95 valid, 5 malformed addresses in a name-matched email column.
    let mut values: Vec<String> = (0..95).map(|i| format!("user{}@example.com", i)).collect();
    values.extend((0..5).map(|i| format!("malformed-{}", i)));
    let batch = owned_column_batch("user_email", &values);

    let mut checker = ConsistencyChecker::new();
    checker.process_chunk(&batch);
    let issues = checker.evaluate(&profiles_for(&[batch]));

    let message = &issues["user_email"][0];
    assert!(message.contains("Email format violations"));
    assert!(message.contains("5.0% invalid"));
}

#[test]
fn test_clean_email_column_passes() {
    let values: Vec<String> = (0..50).map(|i| format!("user{}@example.com", i)).collect();
    let batch = owned_column_batch("user_email", &values);

    let mut checker = ConsistencyChecker::new();
    checker.process_chunk(&batch);
    let issues = checker.evaluate(&profiles_for(&[batch]));
    assert!(!issues.contains_key("user_email"));
}

#[test]
fn test_short_phone_numbers_flagged() {
    let mut values: Vec<String> = (0..90).map(|i| format!("+4915200{:05}", i)).collect();
    values.extend((0..10).map(|i| format!("{}", i)));
    let batch = owned_column_batch("phone", &values);

    let mut checker = ConsistencyChecker::new();
    checker.process_chunk(&batch);
    let issues = checker.evaluate(&profiles_for(&[batch]));

    assert!(issues["phone"]
        .iter()
        .any(|m| m.contains("Phone number length")));
}

#[test]
fn test_future_dates_flagged() {
    let values: Vec<String> = (0..20).map(|i| format!("2099-01-{:02}", (i % 28) + 1)).collect();
    let batch = owned_column_batch("event_date", &values);

    let mut checker = ConsistencyChecker::new();
    checker.process_chunk(&batch);
    let issues = checker.evaluate(&profiles_for(&[batch]));

    assert!(issues["event_date"]
        .iter()
        .any(|m| m.contains("future dates")));
}

#[test]
fn test_negative_amounts_flagged() {
    let mut values: Vec<String> = (0..95).map(|i| format!("{}", i + 1)).collect();
    values.extend((0..5).map(|i| format!("-{}", i + 1)));
    let batch = owned_column_batch("amount", &values);

    let mut checker = ConsistencyChecker::new();
    checker.process_chunk(&batch);
    let issues = checker.evaluate(&profiles_for(&[batch]));

    assert!(issues["amount"]
        .iter()
        .any(|m| m.contains("negative values")));
}

#[test]
fn test_url_scheme_violations_flagged() {
    let mut values: Vec<String> = (0..80).map(|i| format!("https://example.com/{}", i)).collect();
    values.extend((0..20).map(|i| format!("example.com/{}", i)));
    let batch = owned_column_batch("homepage_url", &values);

    let mut checker = ConsistencyChecker::new();
    checker.process_chunk(&batch);
    let issues = checker.evaluate(&profiles_for(&[batch]));

    assert!(issues["homepage_url"]
        .iter()
        .any(|m| m.contains("URL format")));
}

// ========== Scoring tests ==========

fn clean_profile() -> ColumnProfile {
    ColumnProfile {
        missing_percentage: 0.0,
        unique_ratio: 1.0,
        unique_count: 100,
        inferred_type: InferredType::Numeric,
        mixed_types: false,
        top_values: Vec::new(),
        numeric: None,
        categorical: CategoricalSummary {
            cardinality: 100,
            entropy: 4.0,
            rare_categories: Vec::new(),
            rare_threshold: 0.02,
        },
    }
}

fn empty_duplicates() -> DuplicateStats {
    DuplicateStats {
        duplicate_count: 0,
        duplicate_ratio: 0.0,
        key_duplicates: std::collections::HashMap::new(),
        fuzzy_duplicate_pairs: 0,
    }
}

#[test]
fn test_empty_profiles_score_zero_critical() {
    let score = compute_reliability_score(
        &std::collections::HashMap::new(),
        &std::collections::HashMap::new(),
        &AnomalyStats::default(),
        &empty_duplicates(),
        &ScoringWeights::default(),
    );
    assert!(score.score.abs() < 1e-12);
    assert_eq!(score.status, HealthStatus::Critical);
}

#[test]
fn test_clean_dataset_scores_perfect() {
    let mut profiles = std::collections::HashMap::new();
    profiles.insert("a".to_string(), clean_profile());
    profiles.insert("b".to_string(), clean_profile());

    let score = compute_reliability_score(
        &profiles,
        &std::collections::HashMap::new(),
        &AnomalyStats::default(),
        &empty_duplicates(),
        &ScoringWeights::default(),
    );
    assert!((score.score - 100.0).abs() < 1e-12);
    assert_eq!(score.status, HealthStatus::Healthy);
    assert!((score.dimensions.completeness - 100.0).abs() < 1e-12);
    assert!((score.dimensions.timeliness - 100.0).abs() < 1e-12);
}

#[test]
fn test_weighted_blend_and_dimensions() {
    let mut profile = clean_profile();
    profile.missing_percentage = 10.0;
    let mut profiles = std::collections::HashMap::new();
    profiles.insert("a".to_string(), profile);

    let anomalies = AnomalyStats {
        anomaly_count: 2,
        anomaly_ratio: 0.02,
        sample_size: 100,
        z_score_outliers: 0,
        modified_z_outliers: 0,
        iqr_outliers: 0,
    };

    let score = compute_reliability_score(
        &profiles,
        &std::collections::HashMap::new(),
        &anomalies,
        &empty_duplicates(),
        &ScoringWeights::default(),
    );

    // 100 - (1.0 * 10 + 1.5 * 2 + 1.0 * 0 + 0.5 * 0)
    assert!((score.score - 87.0).abs() < 1e-9);
    assert_eq!(score.status, HealthStatus::Healthy);
    assert!((score.dimensions.completeness - 90.0).abs() < 1e-9);
    assert!((score.dimensions.validity - 99.0).abs() < 1e-9);
    assert!((score.dimensions.accuracy - 99.0).abs() < 1e-9);
    assert!((score.dimensions.consistency - 100.0).abs() < 1e-9);
}

#[test]
fn test_status_bands() {
    assert_eq!(HealthStatus::from_score(92.0), HealthStatus::Healthy);
    assert_eq!(HealthStatus::from_score(85.0), HealthStatus::Healthy);
    assert_eq!(HealthStatus::from_score(70.0), HealthStatus::Warning);
    assert_eq!(HealthStatus::from_score(60.0), HealthStatus::Warning);
    assert_eq!(HealthStatus::from_score(59.9), HealthStatus::Critical);
}

#[test]
fn test_score_clamped_to_range() {
    let mut profile = clean_profile();
    profile.missing_percentage = 100.0;
    let mut profiles = std::collections::HashMap::new();
    profiles.insert("a".to_string(), profile);

    let mut issues = std::collections::HashMap::new();
    issues.insert("a".to_string(), vec!["broken".to_string()]);

    let anomalies = AnomalyStats {
        anomaly_count: 50,
        anomaly_ratio: 0.5,
        sample_size: 100,
        z_score_outliers: 0,
        modified_z_outliers: 0,
        iqr_outliers: 0,
    };
    let duplicates = DuplicateStats {
        duplicate_count: 50,
        duplicate_ratio: 0.5,
        key_duplicates: std::collections::HashMap::new(),
        fuzzy_duplicate_pairs: 0,
    };

    let score = compute_reliability_score(
        &profiles,
        &issues,
        &anomalies,
        &duplicates,
        &ScoringWeights::default(),
    );
    assert!(score.score.abs() < 1e-12);
    assert_eq!(score.status, HealthStatus::Critical);
}
