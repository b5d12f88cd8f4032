//! Plain-text rendering for the terminal: the municipality table and
//! horizontal bar charts.

use serde::{Deserialize, Serialize};

use crate::models::ReportRow;

/// Width of the longest bar, in characters.
pub const BAR_WIDTH: usize = 40;

/// One bar of a chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

/// A ranking ready to be drawn, largest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn new<F>(title: impl Into<String>, rows: Vec<&ReportRow>, value: F) -> Self
    where
        F: Fn(&ReportRow) -> f64,
    {
        Self {
            title: title.into(),
            bars: rows
                .into_iter()
                .map(|r| Bar {
                    label: r.record.name.clone(),
                    value: value(r),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars scaled so the largest value spans `width` characters.
    pub fn render_text(&self, width: usize) -> String {
        let mut out = format!("{}\n", self.title);
        if self.bars.is_empty() {
            out.push_str("  (no data)\n");
            return out;
        }

        let label_width = self.bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
        let max = self.bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);

        for bar in &self.bars {
            let len = if max > 0.0 {
                ((bar.value / max) * width as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!(
                "  {:<lw$} │{} {:.2}\n",
                bar.label,
                "█".repeat(len),
                bar.value,
                lw = label_width
            ));
        }
        out
    }
}

const HEADERS: [&str; 7] = [
    "Municipality",
    "Women",
    "Men",
    "Total",
    "Women 15-29 %",
    "Income R$",
    "Female heads %",
];

/// Aligned text table of report rows.
pub fn render_table(rows: &[ReportRow]) -> String {
    let cells: Vec<[String; 7]> = rows
        .iter()
        .map(|r| {
            [
                r.record.name.clone(),
                r.record.female_population.to_string(),
                r.record.male_population.to_string(),
                r.total_population.to_string(),
                format!("{:.2}", r.young_female_pct),
                r.record
                    .per_capita_income
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| "-".to_string()),
                format!("{:.2}", r.female_headship_pct),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out
}

/// Name column left-aligned, numbers right-aligned.
fn push_line(out: &mut String, cells: &[String; 7], widths: &[usize; 7]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, w))| {
            if i == 0 {
                format!("{:<w$}", cell, w = w)
            } else {
                format!("{:>w$}", cell, w = w)
            }
        })
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_table_layout() {
        let report = sample_report();
        let text = render_table(&report.rows);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2 + report.rows.len());
        assert!(lines[0].starts_with("Municipality"));
        assert!(lines[1].starts_with("------------"));
        assert!(lines[2].starts_with("Niterói"));
        assert!(lines[2].contains("2000.50"));
        // Paraty has no income
        assert!(lines[4].contains(" - |"));
    }

    #[test]
    fn test_bar_chart_scaling() {
        let chart = BarChart {
            title: "Top".into(),
            bars: vec![
                Bar { label: "A".into(), value: 50.0 },
                Bar { label: "Bb".into(), value: 25.0 },
            ],
        };
        let text = chart.render_text(10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Top");
        assert_eq!(lines[1], "  A  │██████████ 50.00");
        assert_eq!(lines[2], "  Bb │█████ 25.00");
    }

    #[test]
    fn test_empty_chart() {
        let chart = BarChart { title: "Top".into(), bars: Vec::new() };
        assert!(chart.is_empty());
        assert!(chart.render_text(BAR_WIDTH).contains("(no data)"));
    }

    #[test]
    fn test_report_charts() {
        let charts = sample_report().charts(10);
        assert_eq!(charts.len(), 3);
        assert_eq!(charts[1].bars.len(), 2);
        assert_eq!(charts[1].bars[0].label, "Niterói");
    }
}
