//! Fold tagged table rows into one record per municipality.
//!
//! # Architecture
//!
//! ```text
//! Population rows (one per sex × age band)       Records (one per municipality)
//! ┌─────────────────────────────────────┐       ┌──────────────────────────────┐
//! │ 3300100, Mulheres, Total,       600 │       │ 3300100 Angra dos Reis       │
//! │ 3300100, Homens,   Total,       400 │  →    │   female 600, male 400       │
//! │ 3300100, Mulheres, 15 a 19 anos, 50 │       │   young female 50            │
//! └─────────────────────────────────────┘       │   income 512.3, headship 120 │
//! Income rows   (3300100, 512.3)          →     └──────────────────────────────┘
//! Headship rows (3300100, 120)            →
//! ```
//!
//! Population rows define the set of municipalities. Income and headship
//! rows only attach values to municipalities already seen; the rest are
//! dropped.

use std::collections::HashMap;

use crate::ibge::Source;
use crate::models::{AgeBand, MunicipalityRecord, Sex};
use crate::parser::{parse_count, parse_decimal, RawTable, SkippedRow, TableRow};

/// Dimension labels carrying the sex of a population row.
pub const SEX_DIMENSIONS: [&str; 1] = ["Sexo"];

/// Dimension labels carrying the age band of a population row.
pub const AGE_DIMENSIONS: [&str; 2] = ["Grupo de idade", "Idade"];

/// Dimension labels carrying the sex of the head of household.
pub const HEAD_SEX_DIMENSIONS: [&str; 3] = [
    "Sexo do responsável",
    "Sexo da pessoa responsável",
    "Sexo da pessoa responsável pelo domicílio",
];

/// Columns that describe the request rather than break the value down.
pub const METADATA_DIMENSIONS: [&str; 6] = [
    "Nível Territorial",
    "Brasil",
    "Ano",
    "Variável",
    "Unidade de Medida",
    "Município",
];

/// A row left out of the fold.
#[derive(Debug, Clone, PartialEq)]
pub struct ReshapeSkip {
    pub source: Source,
    pub row: usize,
    pub reason: String,
}

/// Output of [`reshape`].
#[derive(Debug, Clone, Default)]
pub struct Reshaped {
    /// Municipality code -> accumulator.
    pub records: HashMap<u64, MunicipalityRecord>,
    /// Malformed rows (missing tag, unparseable value, missing code).
    pub skipped: Vec<ReshapeSkip>,
    /// Income/headship rows for municipalities absent from the population table.
    pub dropped: usize,
    /// Normalized rows per source, as fed to the fold.
    pub row_counts: HashMap<Source, usize>,
}

impl Reshaped {
    /// Normalized rows obtained from a source.
    pub fn row_count(&self, source: Source) -> usize {
        self.row_counts.get(&source).copied().unwrap_or(0)
    }

    fn skip(&mut self, source: Source, row: usize, reason: impl Into<String>) {
        self.skipped.push(ReshapeSkip {
            source,
            row,
            reason: reason.into(),
        });
    }
}

/// Fold the three sources into per-municipality records.
pub fn reshape(population: &[TableRow], income: &[TableRow], headship: &[TableRow]) -> Reshaped {
    let mut out = Reshaped::default();
    out.row_counts = HashMap::from([
        (Source::Population, population.len()),
        (Source::Income, income.len()),
        (Source::Headship, headship.len()),
    ]);

    for (i, row) in population.iter().enumerate() {
        fold_population(&mut out, i, row);
    }

    for (i, row) in income.iter().enumerate() {
        let Some(record) = out.records.get_mut(&row.code) else {
            out.dropped += 1;
            continue;
        };
        match parse_decimal(&row.value) {
            Some(value) => record.per_capita_income = Some(value),
            None => out.skip(Source::Income, i, format!("unparseable value '{}'", row.value)),
        }
    }

    for (i, row) in headship.iter().enumerate() {
        if let Some(head_sex) = row.tag_any(&HEAD_SEX_DIMENSIONS) {
            if Sex::from_label(head_sex) != Some(Sex::Female) {
                continue;
            }
        }
        let Some(record) = out.records.get_mut(&row.code) else {
            out.dropped += 1;
            continue;
        };
        match parse_count(&row.value) {
            Some(value) => record.female_headed_households = Some(value),
            None => out.skip(Source::Headship, i, format!("unparseable value '{}'", row.value)),
        }
    }

    out
}

fn fold_population(out: &mut Reshaped, i: usize, row: &TableRow) {
    let record = out
        .records
        .entry(row.code)
        .or_insert_with(|| MunicipalityRecord::new(row.code, row.name.clone()));
    if record.name.is_empty() {
        record.name = row.name.clone();
    }

    let (Some(sex), Some(age)) = (row.tag_any(&SEX_DIMENSIONS), row.tag_any(&AGE_DIMENSIONS)) else {
        out.skip(Source::Population, i, "missing sex or age group");
        return;
    };

    // Urban-only, rural-only... cells would be summed on top of the totals
    if is_partial_breakdown(row) {
        return;
    }

    let target = match (Sex::from_label(sex), AgeBand::from_label(age)) {
        (Some(Sex::Male), AgeBand::Total) => &mut record.male_population,
        (Some(Sex::Female), AgeBand::Total) => &mut record.female_population,
        (Some(Sex::Female), AgeBand::Young) => &mut record.young_female_population,
        _ => return,
    };

    let Some(value) = parse_count(&row.value) else {
        out.skip(Source::Population, i, format!("unparseable value '{}'", row.value));
        return;
    };
    match target.checked_add(value) {
        Some(sum) => *target = sum,
        None => out.skip(Source::Population, i, "value overflows"),
    }
}

/// Whether the row is a subset of some other breakdown (a category other
/// than "Total" outside sex and age group).
fn is_partial_breakdown(row: &TableRow) -> bool {
    row.tags.iter().any(|(label, category)| {
        let label = label.as_str();
        !label.ends_with("(Código)")
            && !METADATA_DIMENSIONS.contains(&label)
            && !SEX_DIMENSIONS.contains(&label)
            && !AGE_DIMENSIONS.contains(&label)
            && !category.trim().eq_ignore_ascii_case("total")
    })
}

/// Normalize raw tables and fold them. Rows the parser could not key by
/// municipality are reported as skipped.
pub fn reshape_tables(population: &RawTable, income: &RawTable, headship: &RawTable) -> Reshaped {
    let population = population.rows();
    let income = income.rows();
    let headship = headship.rows();

    let mut out = reshape(&population.rows, &income.rows, &headship.rows);

    for (source, skipped) in [
        (Source::Population, &population.skipped),
        (Source::Income, &income.skipped),
        (Source::Headship, &headship.skipped),
    ] {
        out.skipped.extend(skipped.iter().map(|SkippedRow { row, reason }| ReshapeSkip {
            source,
            row: *row,
            reason: reason.clone(),
        }));
    }

    out
}
