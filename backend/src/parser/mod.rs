//! Raw statistics tables and locale-aware value parsing.
//!
//! IBGE serves the same aggregate tables in two shapes:
//!
//! ```text
//! SIDRA /values (columnar)                 Aggregates v3 (nested)
//! ┌──────────────────────────────┐         ┌───────────────────────────────────┐
//! │ {"D1C":"Município (Código)", │ header  │ [{ "variavel": "...",             │
//! │  "D4N":"Sexo", "V":"Valor"}  │         │    "resultados": [{               │
//! │ {"D1C":"3300100",            │ rows    │      "classificacoes": [...],     │
//! │  "D4N":"Mulheres","V":"12"}  │         │      "series": [{ "localidade",   │
//! │ ...                          │         │                   "serie" }] }] }]│
//! └──────────────────────────────┘         └───────────────────────────────────┘
//! ```
//!
//! Both are normalized into [`TableRow`]s: a municipality code and name, a
//! map of dimension label to category label (e.g. `"Sexo" -> "Mulheres"`)
//! and the raw cell value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::{ParseError, ParseResult};
use crate::models::municipality_name;

/// Header label of the municipality code column.
pub const CODE_LABEL: &str = "Município (Código)";

/// Header label of the municipality name column.
pub const NAME_LABEL: &str = "Município";

/// Header key of the value column.
pub const VALUE_KEY: &str = "V";

// =============================================================================
// Normalized rows
// =============================================================================

/// One data cell of an aggregate table, tagged with its categories.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub code: u64,
    /// Name as sent by the source, state suffix removed.
    pub name: String,
    /// Dimension label -> category label.
    pub tags: HashMap<String, String>,
    /// Raw value text, possibly locale formatted or a sentinel like "-".
    pub value: String,
}

impl TableRow {
    pub fn tag(&self, dimension: &str) -> Option<&str> {
        self.tags.get(dimension).map(String::as_str)
    }

    /// First tag present among several candidate dimension labels.
    pub fn tag_any(&self, dimensions: &[&str]) -> Option<&str> {
        dimensions.iter().find_map(|d| self.tag(d))
    }
}

/// A row that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// Index of the row in its table (0-based, header excluded).
    pub row: usize,
    pub reason: String,
}

/// Rows extracted from a table plus the ones that were skipped.
#[derive(Debug, Clone, Default)]
pub struct TableRows {
    pub rows: Vec<TableRow>,
    pub skipped: Vec<SkippedRow>,
}

// =============================================================================
// Raw tables
// =============================================================================

/// An aggregate table as returned by one of the IBGE table APIs.
#[derive(Debug, Clone)]
pub enum RawTable {
    Columnar(ColumnarTable),
    Nested(Vec<NestedVariable>),
}

/// SIDRA "values" table: a header object describing the columns, then one
/// object per data cell using the same keys.
#[derive(Debug, Clone, Default)]
pub struct ColumnarTable {
    code_key: String,
    name_key: Option<String>,
    value_key: String,
    /// (column key, column label) of every other column.
    tag_columns: Vec<(String, String)>,
    rows: Vec<Map<String, Value>>,
}

/// One variable of an aggregates v3 response.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedVariable {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub variavel: String,
    #[serde(default)]
    pub resultados: Vec<NestedResult>,
}

/// One category combination of a variable.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedResult {
    #[serde(default)]
    pub classificacoes: Vec<NestedClassification>,
    #[serde(default)]
    pub series: Vec<NestedSeries>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedClassification {
    pub nome: String,
    /// Category id -> category label; a single entry per result.
    #[serde(default)]
    pub categoria: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedSeries {
    pub localidade: NestedLocality,
    /// Period -> value.
    #[serde(default)]
    pub serie: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedLocality {
    pub id: Value,
    #[serde(default)]
    pub nome: String,
}

impl RawTable {
    /// A table with no rows; what a failed fetch degrades to.
    pub fn empty() -> Self {
        RawTable::Columnar(ColumnarTable::default())
    }

    /// Recognize the response shape and resolve its columns.
    pub fn from_json(value: &Value) -> ParseResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| ParseError::UnknownShape(describe(value)))?;

        let Some(first) = items.first() else {
            return Ok(Self::empty());
        };

        if first.get("resultados").is_some() {
            let variables: Vec<NestedVariable> = serde_json::from_value(value.clone())?;
            return Ok(RawTable::Nested(variables));
        }

        let header = first.as_object().ok_or(ParseError::MissingHeader)?;
        let rows = items[1..]
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect();
        ColumnarTable::new(header, rows).map(RawTable::Columnar)
    }

    /// Parse a response body.
    pub fn parse(body: &str) -> ParseResult<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_json(&value)
    }

    /// Number of data cells before normalization.
    pub fn len(&self) -> usize {
        match self {
            RawTable::Columnar(table) => table.rows.len(),
            RawTable::Nested(variables) => variables
                .iter()
                .flat_map(|v| &v.resultados)
                .map(|r| r.series.len())
                .sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize into tagged rows. Rows without a usable municipality code
    /// are skipped, never fatal.
    pub fn rows(&self) -> TableRows {
        match self {
            RawTable::Columnar(table) => table.rows(),
            RawTable::Nested(variables) => nested_rows(variables),
        }
    }
}

impl ColumnarTable {
    fn new(header: &Map<String, Value>, rows: Vec<Map<String, Value>>) -> ParseResult<Self> {
        let labels: Vec<(String, String)> = header
            .iter()
            .map(|(k, v)| (k.clone(), cell_text(v)))
            .collect();

        let code_key = labels
            .iter()
            .find(|(_, label)| label == CODE_LABEL)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| ParseError::MissingColumn(CODE_LABEL.to_string()))?;

        let name_key = labels
            .iter()
            .find(|(_, label)| label == NAME_LABEL)
            .map(|(k, _)| k.clone());

        let value_key = if header.contains_key(VALUE_KEY) {
            VALUE_KEY.to_string()
        } else {
            labels
                .iter()
                .find(|(_, label)| label == "Valor")
                .map(|(k, _)| k.clone())
                .ok_or_else(|| ParseError::MissingColumn(VALUE_KEY.to_string()))?
        };

        let tag_columns = labels
            .into_iter()
            .filter(|(k, _)| *k != code_key && *k != value_key && Some(k) != name_key.as_ref())
            .collect();

        Ok(Self {
            code_key,
            name_key,
            value_key,
            tag_columns,
            rows,
        })
    }

    fn rows(&self) -> TableRows {
        let mut out = TableRows::default();

        for (i, row) in self.rows.iter().enumerate() {
            let code = match row.get(&self.code_key).and_then(parse_code) {
                Some(c) => c,
                None => {
                    out.skipped.push(SkippedRow {
                        row: i,
                        reason: "missing or invalid municipality code".to_string(),
                    });
                    continue;
                }
            };

            let name = self
                .name_key
                .as_ref()
                .and_then(|k| row.get(k))
                .map(|v| municipality_name(&cell_text(v)))
                .unwrap_or_default();

            let tags = self
                .tag_columns
                .iter()
                .filter_map(|(key, label)| row.get(key).map(|v| (label.clone(), cell_text(v))))
                .collect();

            let value = row.get(&self.value_key).map(cell_text).unwrap_or_default();

            out.rows.push(TableRow { code, name, tags, value });
        }

        out
    }
}

fn nested_rows(variables: &[NestedVariable]) -> TableRows {
    let mut out = TableRows::default();
    let mut index = 0;

    for variable in variables {
        for result in &variable.resultados {
            let tags: HashMap<String, String> = result
                .classificacoes
                .iter()
                .filter_map(|c| {
                    c.categoria
                        .values()
                        .next()
                        .map(|label| (c.nome.clone(), label.clone()))
                })
                .collect();

            for series in &result.series {
                let row = index;
                index += 1;

                let Some(code) = parse_code(&series.localidade.id) else {
                    out.skipped.push(SkippedRow {
                        row,
                        reason: "missing or invalid municipality code".to_string(),
                    });
                    continue;
                };

                // A single period is requested; take the latest if several come back.
                let value = series
                    .serie
                    .values()
                    .next_back()
                    .map(cell_text)
                    .unwrap_or_default();

                out.rows.push(TableRow {
                    code,
                    name: municipality_name(&series.localidade.nome),
                    tags: tags.clone(),
                    value,
                });
            }
        }
    }

    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_code(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    let mut text = value.to_string();
    if text.len() > 80 {
        let mut end = 80;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push('…');
    }
    format!("expected an array, got {} {}", kind, text)
}

// =============================================================================
// Locale-aware numbers
// =============================================================================

/// Integers written with thousands groups: "12.345", "1,234,567", "12 345".
static GROUPED_INTEGER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:[.,\u{a0} ]\d{3})+$").ok());

/// Parse a count. Thousands separators are stripped, so `"12.345"` is 12345.
///
/// Sentinels such as `"-"`, `"..."` or `"X"` (suppressed or not applicable
/// in IBGE tables) return `None`.
pub fn parse_count(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }

    let grouped = GROUPED_INTEGER.as_ref().is_some_and(|re| re.is_match(s));
    if grouped {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        return digits.parse().ok();
    }

    parse_decimal(s)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
        .map(|v| v as u64)
}

/// Parse a decimal written either as `"1234.56"` or in pt-BR form
/// (`"1.234,56"`, `"1234,56"`).
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}'))
        .collect();
    if s.is_empty() {
        return None;
    }

    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');

    let normalized = match (last_dot, last_comma) {
        // Both present: the rightmost one is the decimal separator.
        (Some(d), Some(c)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) if s.matches(',').count() > 1 => s.replace(',', ""),
        (None, Some(_)) => s.replace(',', "."),
        (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Body decoding
// =============================================================================

/// Detect the encoding of a response body using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode a response body to text.
///
/// Valid UTF-8 is used as is; otherwise the detected legacy encoding is used.
pub fn decode_body(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    decode_as(&detect_encoding(bytes), bytes)
}

/// Decode with a known encoding label.
///
/// `iso-8859-1` follows the WHATWG mapping (windows-1252), which agrees with
/// Latin-1 on every printable byte.
pub fn decode_as(encoding: &str, bytes: &[u8]) -> String {
    match encoding {
        "windows-1252" | "iso-8859-1" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columnar_fixture() -> Value {
        json!([
            {"NC": "Nível Territorial (Código)", "NN": "Nível Territorial",
             "V": "Valor", "D1C": "Município (Código)", "D1N": "Município",
             "D2N": "Sexo", "D3N": "Grupo de idade"},
            {"NC": "6", "NN": "Município", "V": "600", "D1C": "3300100",
             "D1N": "Angra dos Reis - RJ", "D2N": "Mulheres", "D3N": "Total"},
            {"NC": "6", "NN": "Município", "V": "400", "D1C": "3300100",
             "D1N": "Angra dos Reis - RJ", "D2N": "Homens", "D3N": "Total"}
        ])
    }

    fn nested_fixture() -> Value {
        json!([{
            "id": "93",
            "variavel": "População residente",
            "unidade": "Pessoas",
            "resultados": [
                {
                    "classificacoes": [
                        {"id": "2", "nome": "Sexo", "categoria": {"5": "Mulheres"}},
                        {"id": "58", "nome": "Grupo de idade", "categoria": {"95253": "Total"}}
                    ],
                    "series": [
                        {"localidade": {"id": "3300100", "nivel": {"id": "N6", "nome": "Município"},
                                        "nome": "Angra dos Reis - RJ"},
                         "serie": {"2010": "600"}}
                    ]
                },
                {
                    "classificacoes": [
                        {"id": "2", "nome": "Sexo", "categoria": {"4": "Homens"}},
                        {"id": "58", "nome": "Grupo de idade", "categoria": {"95253": "Total"}}
                    ],
                    "series": [
                        {"localidade": {"id": "3300100", "nome": "Angra dos Reis - RJ"},
                         "serie": {"2010": "400"}}
                    ]
                }
            ]
        }])
    }

    #[test]
    fn test_columnar_rows() {
        let table = RawTable::from_json(&columnar_fixture()).unwrap();
        assert!(matches!(table, RawTable::Columnar(_)));
        assert_eq!(table.len(), 2);

        let rows = table.rows();
        assert!(rows.skipped.is_empty());
        assert_eq!(rows.rows[0].code, 3300100);
        assert_eq!(rows.rows[0].name, "Angra dos Reis");
        assert_eq!(rows.rows[0].tag("Sexo"), Some("Mulheres"));
        assert_eq!(rows.rows[0].tag("Grupo de idade"), Some("Total"));
        assert_eq!(rows.rows[0].value, "600");
    }

    #[test]
    fn test_nested_rows() {
        let table = RawTable::from_json(&nested_fixture()).unwrap();
        assert!(matches!(table, RawTable::Nested(_)));
        assert_eq!(table.len(), 2);

        let rows = table.rows();
        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[1].code, 3300100);
        assert_eq!(rows.rows[1].name, "Angra dos Reis");
        assert_eq!(rows.rows[1].tag("Sexo"), Some("Homens"));
        assert_eq!(rows.rows[1].value, "400");
    }

    #[test]
    fn test_shapes_normalize_alike() {
        let columnar = RawTable::from_json(&columnar_fixture()).unwrap().rows();
        let nested = RawTable::from_json(&nested_fixture()).unwrap().rows();

        for (a, b) in columnar.rows.iter().zip(&nested.rows) {
            assert_eq!(a.code, b.code);
            assert_eq!(a.name, b.name);
            assert_eq!(a.tag("Sexo"), b.tag("Sexo"));
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn test_empty_array_is_empty_table() {
        let table = RawTable::from_json(&json!([])).unwrap();
        assert!(table.is_empty());
        assert!(table.rows().rows.is_empty());
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = RawTable::from_json(&json!([
            {"V": "Valor", "D1C": "Município (Código)"}
        ]))
        .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_error_message_payload_rejected() {
        let result = RawTable::from_json(&json!("Tabela 200 não contém a variável 9999"));
        assert!(matches!(result, Err(ParseError::UnknownShape(_))));
    }

    #[test]
    fn test_missing_code_column_rejected() {
        let result = RawTable::from_json(&json!([
            {"V": "Valor", "D1N": "Município"},
            {"V": "10", "D1N": "Angra dos Reis - RJ"}
        ]));
        assert!(matches!(result, Err(ParseError::MissingColumn(_))));
    }

    #[test]
    fn test_row_without_code_skipped() {
        let table = RawTable::from_json(&json!([
            {"V": "Valor", "D1C": "Município (Código)", "D1N": "Município"},
            {"V": "10", "D1C": "", "D1N": "?"},
            {"V": "20", "D1C": "3300100", "D1N": "Angra dos Reis - RJ"}
        ]))
        .unwrap();
        let rows = table.rows();
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.skipped.len(), 1);
        assert_eq!(rows.skipped[0].row, 0);
    }

    #[test]
    fn test_numeric_cells_accepted() {
        let table = RawTable::from_json(&json!([
            {"V": "Valor", "D1C": "Município (Código)"},
            {"V": 1234.5, "D1C": 3300100}
        ]))
        .unwrap();
        let rows = table.rows();
        assert_eq!(rows.rows[0].code, 3300100);
        assert_eq!(rows.rows[0].value, "1234.5");
    }

    #[test]
    fn test_parse_count_thousands() {
        assert_eq!(parse_count("12.345"), Some(12345));
        assert_eq!(parse_count("1.234.567"), Some(1234567));
        assert_eq!(parse_count("1,234,567"), Some(1234567));
        assert_eq!(parse_count("600"), Some(600));
        assert_eq!(parse_count(" 42 "), Some(42));
        assert_eq!(parse_count("600.0"), Some(600));
    }

    #[test]
    fn test_parse_count_sentinels() {
        assert_eq!(parse_count("-"), None);
        assert_eq!(parse_count("..."), None);
        assert_eq!(parse_count("X"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("1,5"), None);
    }

    #[test]
    fn test_parse_decimal_formats() {
        assert_eq!(parse_decimal("1234.56"), Some(1234.56));
        assert_eq!(parse_decimal("1234,56"), Some(1234.56));
        assert_eq!(parse_decimal("1.234,56"), Some(1234.56));
        assert_eq!(parse_decimal("1,234.56"), Some(1234.56));
        assert_eq!(parse_decimal("512"), Some(512.0));
        assert_eq!(parse_decimal("-"), None);
        assert_eq!(parse_decimal("..."), None);
    }

    #[test]
    fn test_decode_utf8_body() {
        assert_eq!(decode_body("São Gonçalo".as_bytes()), "São Gonçalo");
    }

    #[test]
    fn test_decode_latin1_body() {
        // "Niterói" in ISO-8859-1
        let bytes: &[u8] = &[0x4E, 0x69, 0x74, 0x65, 0x72, 0xF3, 0x69];
        let decoded = decode_body(bytes);
        assert!(decoded.starts_with("Niter"));
        assert!(decoded.ends_with('i'));
    }

    #[test]
    fn test_latin1_bytes_keep_latin1_meaning() {
        // Bytes where ISO-8859-15 would give €, Š, š, Ž, ž, Œ, œ, Ÿ
        let bytes: &[u8] = &[0xA4, 0xA6, 0xA8, 0xB4, 0xB8, 0xBC, 0xBD, 0xBE];
        assert_eq!(decode_as("iso-8859-1", bytes), "¤¦¨´¸¼½¾");
        assert_eq!(decode_as("iso-8859-1", &[0x53, 0xE3, 0x6F]), "São");
    }
}
