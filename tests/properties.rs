mod common;

use csv_sieve::{RuleSet, Table, assess_quality, clean, compute_statistics, validate_and_partition};
use proptest::prelude::*;

use common::{TRANSACTION_HEADERS, reference};

fn id_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "TXN_00[0-9]_[A-C]{3}",
        "[a-z ]{0,6}",
        Just(String::new()),
    ]
}

fn amount_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,4}\\.[0-9]{2}",
        "-?[0-9]{1,3}(\\.[0-9]{1,4})?",
        "[a-z]{1,3}",
    ]
}

fn timestamp_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "20[0-3][0-9]-0[1-9]-[0-2][0-9]",
        "20[0-3][0-9]-1[0-2]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9]Z?",
        "[0-9/ ]{4,10}",
    ]
}

fn country_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("US".to_string()),
        Just("GB".to_string()),
        "[A-Za-z]{2}",
        Just(String::new()),
    ]
}

fn rows() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        (id_cell(), amount_cell(), timestamp_cell(), country_cell())
            .prop_map(|(id, amount, ts, country)| vec![id, amount, ts, country]),
        0..40,
    )
}

proptest! {
    #[test]
    fn every_row_lands_in_exactly_one_partition_in_order(rows in rows()) {
        let table = Table::from_text_rows(TRANSACTION_HEADERS, rows.clone());
        let partition = validate_and_partition(&table, &RuleSet::default(), reference())
            .expect("headers are complete");

        prop_assert_eq!(partition.valid.len() + partition.invalid.len(), rows.len());

        let valid_lines = partition.valid.iter().map(|r| r.line).collect::<Vec<_>>();
        let invalid_lines = partition.invalid.iter().map(|r| r.record.line).collect::<Vec<_>>();
        prop_assert!(valid_lines.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(invalid_lines.windows(2).all(|w| w[0] < w[1]));

        let mut all = valid_lines;
        all.extend(invalid_lines);
        all.sort_unstable();
        prop_assert_eq!(all, (1..=rows.len()).collect::<Vec<_>>());

        for rejected in &partition.invalid {
            prop_assert!(!rejected.violations.is_empty());
        }
    }

    #[test]
    fn cleaning_is_a_stable_one_to_one_map(rows in rows()) {
        let table = Table::from_text_rows(TRANSACTION_HEADERS, rows);
        let partition = validate_and_partition(&table, &RuleSet::default(), reference())
            .expect("headers are complete");
        let first = clean(&partition.headers, &partition.valid, &RuleSet::default());
        let second = clean(&partition.headers, &partition.valid, &RuleSet::default());
        prop_assert_eq!(first.len(), partition.valid.len());
        prop_assert_eq!(&first, &second);

        let stats = compute_statistics(&first, &partition.invalid);
        prop_assert_eq!(stats.ingestion_summary.total_rows_read, table.row_count());
        prop_assert!(stats.ingestion_summary.data_quality_score_percent.is_finite());
    }

    #[test]
    fn quality_score_stays_within_bounds(rows in rows()) {
        let table = Table::from_text_rows(TRANSACTION_HEADERS, rows);
        let report = assess_quality(&table);
        prop_assert!((0.0..=100.0).contains(&report.quality_score));
    }
}
