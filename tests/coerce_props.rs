mod common;

use chrono::Utc;
use common::source_table;
use licence_ledger::{
    coerce::reconcile_and_coerce,
    reconcile::reconcile,
    schema::{Family, schema_for},
};
use proptest::prelude::*;

proptest! {
    // Coercion is total: any cell content produces exactly one row per input
    // row with exactly one (possibly null) value per canonical column.
    #[test]
    fn coercion_never_panics_and_preserves_row_count(
        cells in prop::collection::vec(
            prop::collection::vec(".{0,24}", 0..6),
            0..8,
        )
    ) {
        let schema = schema_for(Family::StateLicence);
        let headers = ["FBO NAME", "AMOUNT", "EXPIRY", "ingestion_timestamp", "Y", "KOB"];
        let rows: Vec<&[&str]> = Vec::new();
        let mut table = source_table("prop.csv", &headers, &rows);
        table.rows = cells;

        let before = Utc::now().naive_utc();
        let (_, rows) = reconcile_and_coerce(&table, &schema, Some("prop.csv"));

        prop_assert_eq!(rows.len(), table.rows.len());
        for row in &rows {
            prop_assert_eq!(row.values.len(), schema.len());
            let stamped = row.ingestion_timestamp(&schema);
            prop_assert!(stamped.is_some_and(|ts| ts >= before));
        }
    }

    // Reconciliation never maps two canonical columns to one source header.
    #[test]
    fn reconciliation_claims_each_header_at_most_once(
        headers in prop::collection::vec("[ _a-zA-Z0-9]{0,20}", 0..12)
    ) {
        let schema = schema_for(Family::Registration);
        let mapping = reconcile(&headers, &schema);
        let mut claimed: Vec<usize> = schema
            .columns
            .iter()
            .filter_map(|c| mapping.source_index(&c.name))
            .collect();
        let total = claimed.len();
        claimed.sort_unstable();
        claimed.dedup();
        prop_assert_eq!(claimed.len(), total);
    }
}
