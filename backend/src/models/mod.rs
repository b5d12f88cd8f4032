//! Domain models for the census pipeline.
//!
//! - [`StateRef`] - A Brazilian state (unidade da federação)
//! - [`MunicipalityRef`] - A municipality as listed by the localidades service
//! - [`Sex`] / [`AgeBand`] - Categories used to route population counts
//! - [`MunicipalityRecord`] - Per-municipality accumulator built by the reshaper
//! - [`ReportRow`] - A filtered record with its derived percentages

use serde::{Deserialize, Serialize};

// =============================================================================
// Reference Data
// =============================================================================

/// A Brazilian state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateRef {
    /// IBGE state code (e.g. 33 for Rio de Janeiro).
    pub id: u32,
    /// Two-letter acronym (e.g. "RJ").
    pub acronym: String,
    /// Full name.
    pub name: String,
}

impl StateRef {
    /// Whether this state matches a user selection: id, acronym or name.
    ///
    /// Name matching ignores case and Portuguese diacritics, so
    /// "sao paulo" selects "São Paulo".
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if let Ok(id) = query.parse::<u32>() {
            return id == self.id;
        }
        self.acronym.eq_ignore_ascii_case(query) || fold(&self.name) == fold(query)
    }

    /// Lowercase ASCII slug used in file names ("Rio de Janeiro" -> "rio_de_janeiro").
    pub fn slug(&self) -> String {
        fold(&self.name)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Find the state matching a user selection.
pub fn find_state<'a>(states: &'a [StateRef], query: &str) -> Option<&'a StateRef> {
    states.iter().find(|s| s.matches(query))
}

/// A municipality as listed by the localidades service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityRef {
    /// 7-digit IBGE municipality code.
    pub code: u64,
    pub name: String,
}

/// Lowercase and strip Portuguese diacritics.
fn fold(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

// =============================================================================
// Categories
// =============================================================================

/// Sex category of a population row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    /// Both sexes combined.
    Total,
}

impl Sex {
    /// Parse a category label as returned by SIDRA or the aggregates API.
    pub fn from_label(label: &str) -> Option<Self> {
        match fold(label).as_str() {
            "masculino" | "homens" | "homem" => Some(Self::Male),
            "feminino" | "mulheres" | "mulher" => Some(Self::Female),
            "total" => Some(Self::Total),
            _ => None,
        }
    }
}

/// Age band of a population row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBand {
    /// All ages.
    Total,
    /// 15 to 29 years, reported as three five-year bands.
    Young,
    /// Any other band.
    Other,
}

/// Bands that make up the 15-29 group.
pub const YOUNG_AGE_BANDS: [&str; 3] = ["15 a 19 anos", "20 a 24 anos", "25 a 29 anos"];

impl AgeBand {
    pub fn from_label(label: &str) -> Self {
        let label = fold(label);
        if label == "total" {
            Self::Total
        } else if YOUNG_AGE_BANDS.contains(&label.as_str()) {
            Self::Young
        } else {
            Self::Other
        }
    }
}

/// Strip the state suffix from a municipality name ("Niterói - RJ" -> "Niterói").
pub fn municipality_name(raw: &str) -> String {
    raw.split(" - ").next().unwrap_or(raw).trim().to_string()
}

// =============================================================================
// Records
// =============================================================================

/// Accumulator for one municipality, keyed by its code.
///
/// Population fields are sums over zero or more rows and default to 0.
/// Income and headship come from optional sources and stay `None` when the
/// source has no row for this municipality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityRecord {
    pub code: u64,
    pub name: String,
    pub female_population: u64,
    pub male_population: u64,
    /// Women aged 15 to 29.
    pub young_female_population: u64,
    /// Monthly per-capita household income (R$).
    pub per_capita_income: Option<f64>,
    pub female_headed_households: Option<u64>,
}

impl MunicipalityRecord {
    /// Zero-valued accumulator.
    pub fn new(code: u64, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            female_population: 0,
            male_population: 0,
            young_female_population: 0,
            per_capita_income: None,
            female_headed_households: None,
        }
    }

    /// Saturates at `u64::MAX`.
    pub fn total_population(&self) -> u64 {
        self.male_population.saturating_add(self.female_population)
    }
}

/// A record that passed the filters, with its derived fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(flatten)]
    pub record: MunicipalityRecord,
    pub total_population: u64,
    /// Share of women aged 15-29 among all women, in percent.
    pub young_female_pct: f64,
    /// Female-headed households over total population, in percent.
    pub female_headship_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rj() -> StateRef {
        StateRef {
            id: 33,
            acronym: "RJ".into(),
            name: "Rio de Janeiro".into(),
        }
    }

    #[test]
    fn test_state_matching() {
        let sp = StateRef {
            id: 35,
            acronym: "SP".into(),
            name: "São Paulo".into(),
        };
        assert!(sp.matches("35"));
        assert!(sp.matches("sp"));
        assert!(sp.matches("sao paulo"));
        assert!(sp.matches("SÃO PAULO"));
        assert!(!sp.matches("33"));
        assert!(!sp.matches("Paulo"));
    }

    #[test]
    fn test_find_state() {
        let states = vec![rj()];
        assert_eq!(find_state(&states, "RJ").map(|s| s.id), Some(33));
        assert!(find_state(&states, "MG").is_none());
    }

    #[test]
    fn test_state_slug() {
        assert_eq!(rj().slug(), "rio_de_janeiro");
        let pa = StateRef { id: 15, acronym: "PA".into(), name: "Pará".into() };
        assert_eq!(pa.slug(), "para");
    }

    #[test]
    fn test_sex_labels() {
        assert_eq!(Sex::from_label("Masculino"), Some(Sex::Male));
        assert_eq!(Sex::from_label("Homens"), Some(Sex::Male));
        assert_eq!(Sex::from_label("Feminino"), Some(Sex::Female));
        assert_eq!(Sex::from_label("Mulheres"), Some(Sex::Female));
        assert_eq!(Sex::from_label("Total"), Some(Sex::Total));
        assert_eq!(Sex::from_label("Ignorado"), None);
    }

    #[test]
    fn test_age_bands() {
        assert_eq!(AgeBand::from_label("Total"), AgeBand::Total);
        assert_eq!(AgeBand::from_label("15 a 19 anos"), AgeBand::Young);
        assert_eq!(AgeBand::from_label("20 a 24 anos"), AgeBand::Young);
        assert_eq!(AgeBand::from_label("25 a 29 anos"), AgeBand::Young);
        assert_eq!(AgeBand::from_label("30 a 34 anos"), AgeBand::Other);
        assert_eq!(AgeBand::from_label("10 a 14 anos"), AgeBand::Other);
    }

    #[test]
    fn test_municipality_name() {
        assert_eq!(municipality_name("Angra dos Reis - RJ"), "Angra dos Reis");
        assert_eq!(municipality_name("Niterói"), "Niterói");
    }

    #[test]
    fn test_total_population_saturates() {
        let record = MunicipalityRecord {
            female_population: u64::MAX,
            male_population: 1,
            ..MunicipalityRecord::new(1, "A")
        };
        assert_eq!(record.total_population(), u64::MAX);
    }

    #[test]
    fn test_record_serializes_flat() {
        let row = ReportRow {
            record: MunicipalityRecord::new(3303302, "Niterói"),
            total_population: 0,
            young_female_pct: 0.0,
            female_headship_pct: 0.0,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["code"], 3303302);
        assert_eq!(json["name"], "Niterói");
        assert!(json["perCapitaIncome"].is_null());
        assert_eq!(json["totalPopulation"], 0);
    }
}
