//! Filter records and compute the derived percentages.

use crate::models::{MunicipalityRecord, ReportRow};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator` in percent, rounded to two decimals.
/// A zero denominator yields 0.
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

/// Derive one report row. Absent headship counts as 0 households.
pub fn derive_row(record: MunicipalityRecord) -> ReportRow {
    let total_population = record.total_population();
    let young_female_pct = percentage(record.young_female_population, record.female_population);
    let female_headship_pct =
        percentage(record.female_headed_households.unwrap_or(0), total_population);

    ReportRow {
        record,
        total_population,
        young_female_pct,
        female_headship_pct,
    }
}

/// Keep municipalities with strictly more women than men and a total
/// population of at least `min_total_population`, then derive their rows.
///
/// Rows are ordered by female population, descending, ties by code.
pub fn derive_and_filter<I>(records: I, min_total_population: u64) -> Vec<ReportRow>
where
    I: IntoIterator<Item = MunicipalityRecord>,
{
    let mut rows: Vec<ReportRow> = records
        .into_iter()
        .filter(|r| r.female_population > r.male_population)
        .filter(|r| r.total_population() >= min_total_population)
        .map(derive_row)
        .collect();

    rows.sort_by(|a, b| {
        b.record
            .female_population
            .cmp(&a.record.female_population)
            .then(a.record.code.cmp(&b.record.code))
    });

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: u64, female: u64, male: u64, young: u64) -> MunicipalityRecord {
        MunicipalityRecord {
            female_population: female,
            male_population: male,
            young_female_population: young,
            ..MunicipalityRecord::new(code, format!("M{}", code))
        }
    }

    #[test]
    fn test_percentages() {
        let mut a = record(1, 600, 400, 120);
        a.per_capita_income = Some(512.35);
        a.female_headed_households = Some(150);

        let row = derive_row(a);
        assert_eq!(row.total_population, 1000);
        assert_eq!(row.young_female_pct, 20.0);
        assert_eq!(row.female_headship_pct, 15.0);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 10), 0.0);
        assert_eq!(round2(12.345_6), 12.35);
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(percentage(5, 0), 0.0);
        let row = derive_row(record(1, 0, 0, 0));
        assert_eq!(row.young_female_pct, 0.0);
        assert_eq!(row.female_headship_pct, 0.0);
    }

    #[test]
    fn test_absent_headship_is_zero() {
        let row = derive_row(record(1, 600, 400, 120));
        assert_eq!(row.female_headship_pct, 0.0);
        assert_eq!(row.record.female_headed_households, None);
    }

    #[test]
    fn test_filter_strictly_more_women() {
        let rows = derive_and_filter(
            vec![record(1, 600, 400, 0), record(2, 100, 120, 0), record(3, 50, 50, 0)],
            0,
        );
        let codes: Vec<u64> = rows.iter().map(|r| r.record.code).collect();
        assert_eq!(codes, vec![1]);
    }

    #[test]
    fn test_min_population_inclusive() {
        let records = vec![record(1, 600, 400, 0), record(2, 60, 40, 0)];
        assert_eq!(derive_and_filter(records.clone(), 100).len(), 2);
        assert_eq!(derive_and_filter(records.clone(), 101).len(), 1);
        assert!(derive_and_filter(records, 5000).is_empty());
    }

    #[test]
    fn test_sorted_by_female_population_then_code() {
        let rows = derive_and_filter(
            vec![
                record(30, 500, 100, 0),
                record(10, 900, 100, 0),
                record(20, 500, 100, 0),
            ],
            0,
        );
        let codes: Vec<u64> = rows.iter().map(|r| r.record.code).collect();
        assert_eq!(codes, vec![10, 20, 30]);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![record(1, 600, 400, 120), record(2, 700, 300, 70)];
        let once = derive_and_filter(records, 0);
        let twice = derive_and_filter(once.iter().map(|r| r.record.clone()), 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_percentages_in_range() {
        let mut big = record(1, 1_000, 10, 1_000);
        big.female_headed_households = Some(500);
        for row in derive_and_filter(vec![big, record(2, 7, 3, 2)], 0) {
            assert!((0.0..=100.0).contains(&row.young_female_pct));
            assert!((0.0..=100.0).contains(&row.female_headship_pct));
        }
    }
}
