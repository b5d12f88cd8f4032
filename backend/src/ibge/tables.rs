//! 2010 Census aggregate tables used by the report.
//!
//! Each table is requested once per state, scoped to every municipality
//! (`N6`) inside the state (`N3`), and can be served by either table API.

use serde::{Deserialize, Serialize};

/// Logical data source feeding the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Resident population by sex and age group.
    Population,
    /// Per-capita household income.
    Income,
    /// Households with a female head.
    Headship,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Source::Population => "population by sex and age",
            Source::Income => "per-capita income",
            Source::Headship => "female-headed households",
        }
    }
}

/// A classification filter (`c{id}/{categories}` in SIDRA terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub id: u32,
    /// Comma separated category ids, or `all`.
    pub categories: &'static str,
}

/// An aggregate table request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateTable {
    pub source: Source,
    pub table: u32,
    pub period: &'static str,
    pub variable: u32,
    pub classifications: &'static [Classification],
}

/// Table 200, variable 93 (resident population) by sex (c2: 4 men, 5 women)
/// and age group (c58).
pub const POPULATION: AggregateTable = AggregateTable {
    source: Source::Population,
    table: 200,
    period: "2010",
    variable: 93,
    classifications: &[
        Classification { id: 2, categories: "4,5" },
        Classification { id: 58, categories: "all" },
    ],
};

/// Table 5938, variable 38 (per-capita household income).
pub const INCOME: AggregateTable = AggregateTable {
    source: Source::Income,
    table: 5938,
    period: "2010",
    variable: 38,
    classifications: &[],
};

/// Table 1356, variable 207, head of household = female (c315/2).
pub const HEADSHIP: AggregateTable = AggregateTable {
    source: Source::Headship,
    table: 1356,
    period: "2010",
    variable: 207,
    classifications: &[Classification { id: 315, categories: "2" }],
};

/// Every table fetched for a report, in fetch order.
pub const REPORT_TABLES: [AggregateTable; 3] = [POPULATION, INCOME, HEADSHIP];

impl AggregateTable {
    /// SIDRA values URL, e.g.
    /// `{base}/values/t/5938/p/2010/v/38/n6/in%20n3%2033`.
    pub fn sidra_url(&self, base: &str, state_id: u32) -> String {
        let classifications: String = self
            .classifications
            .iter()
            .map(|c| format!("/c{}/{}", c.id, c.categories))
            .collect();

        format!(
            "{}/values/t/{}/p/{}/v/{}{}/n6/in%20n3%20{}",
            base.trim_end_matches('/'),
            self.table,
            self.period,
            self.variable,
            classifications,
            state_id
        )
    }

    /// Aggregates v3 URL, e.g.
    /// `{base}/1356/periodos/2010/variaveis/207?localidades=N6[N3[33]]&classificacao=315[2]`.
    pub fn agregados_url(&self, base: &str, state_id: u32) -> String {
        let mut url = format!(
            "{}/{}/periodos/{}/variaveis/{}?localidades=N6[N3[{}]]",
            base.trim_end_matches('/'),
            self.table,
            self.period,
            self.variable,
            state_id
        );

        if !self.classifications.is_empty() {
            let classifications: Vec<String> = self
                .classifications
                .iter()
                .map(|c| format!("{}[{}]", c.id, c.categories))
                .collect();
            url.push_str("&classificacao=");
            url.push_str(&classifications.join("|"));
        }

        url
    }
}
