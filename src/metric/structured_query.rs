//! Structured-query (SQL) answer metric.
//!
//! Five independent 0/1 checks, equally weighted:
//!
//! 1. `entity_exists`: every table the retrieved query references is known
//!    (to the catalog when one is given, otherwise to the expected query)
//! 2. `fields_match`: the retrieved query references the same columns as
//!    the expected one
//! 3. `keyword_overlap_ok`: at least 80% of the expected query's tokens
//!    appear in the retrieved query
//! 4. `parseable`: the retrieved query parses (sqlparser, generic dialect)
//! 5. `balanced_syntax`: no unbalanced quotes or parentheses
//!
//! References:
//! - sqlparser-rs: <https://docs.rs/sqlparser>

use super::{Metric, MetricScore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{visit_expressions, visit_relations, Expr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

/// Minimum token overlap for the keyword check.
pub const KEYWORD_OVERLAP_THRESHOLD: f64 = 0.8;

/// Known tables and their columns (lowercased).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl SchemaCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with its columns.
    #[must_use]
    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tables.insert(
            table.to_lowercase(),
            columns.into_iter().map(|c| c.as_ref().to_lowercase()).collect(),
        );
        self
    }

    /// Whether the table is known.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    /// Whether any of `tables` has `column`.
    #[must_use]
    pub fn has_column(&self, tables: &BTreeSet<String>, column: &str) -> bool {
        let column = column.to_lowercase();
        tables
            .iter()
            .filter_map(|t| self.tables.get(t))
            .any(|cols| cols.contains(&column))
    }
}

/// Tables and columns referenced by a parsed query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct QueryReferences {
    tables: BTreeSet<String>,
    columns: BTreeSet<String>,
}

/// Parse SQL with the generic dialect.
///
/// # Errors
///
/// Returns `Error::ParseError` for empty or invalid SQL.
pub fn parse_query(sql: &str) -> Result<Vec<Statement>> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| Error::ParseError(e.to_string()))?;
    if statements.is_empty() {
        return Err(Error::ParseError("empty query".to_string()));
    }
    Ok(statements)
}

fn parse(sql: &str) -> Option<Vec<Statement>> {
    parse_query(sql).ok()
}

fn last_segment(name: &str) -> String {
    name.rsplit('.')
        .next()
        .unwrap_or(name)
        .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_lowercase()
}

fn collect_references(statement: &Statement, refs: &mut QueryReferences) -> ControlFlow<()> {
    visit_relations(statement, |relation| {
        refs.tables.insert(last_segment(&relation.to_string()));
        ControlFlow::Continue(())
    })?;

    visit_expressions(statement, |expr| {
        match expr {
            Expr::Identifier(ident) => {
                refs.columns.insert(ident.value.to_lowercase());
            }
            Expr::CompoundIdentifier(parts) => {
                if let Some(last) = parts.last() {
                    refs.columns.insert(last.value.to_lowercase());
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    })
}

fn references(statements: &[Statement]) -> QueryReferences {
    let mut refs = QueryReferences::default();
    for statement in statements {
        if collect_references(statement, &mut refs).is_break() {
            break;
        }
    }
    refs
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of `expected` tokens present in `actual`.
#[allow(clippy::cast_precision_loss)]
fn token_overlap(expected: &str, actual: &str) -> f64 {
    let expected = tokens(expected);
    let actual = tokens(actual);
    if expected.is_empty() {
        return if actual.is_empty() { 1.0 } else { 0.0 };
    }
    expected.intersection(&actual).count() as f64 / expected.len() as f64
}

/// Whether quotes and parentheses are balanced outside string literals.
///
/// A doubled quote inside a literal (`'it''s'`) is an escape, not a close.
#[must_use]
pub fn balanced_syntax(sql: &str) -> bool {
    let mut depth: i64 = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => {
                if chars.peek() == Some(&q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            },
        }
    }

    depth == 0 && quote.is_none()
}

const fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Equal-weight five-check SQL metric.
#[derive(Debug, Clone, Default)]
pub struct StructuredQueryMetric {
    catalog: Option<SchemaCatalog>,
}

impl StructuredQueryMetric {
    /// Metric that checks entities against the expected query.
    #[must_use]
    pub const fn new() -> Self {
        Self { catalog: None }
    }

    /// Metric that checks entities and fields against a schema catalog.
    #[must_use]
    pub const fn with_catalog(catalog: SchemaCatalog) -> Self {
        Self {
            catalog: Some(catalog),
        }
    }

    fn entity_exists(&self, expected: &QueryReferences, actual: &QueryReferences) -> bool {
        if actual.tables.is_empty() {
            return false;
        }
        match &self.catalog {
            Some(catalog) => actual.tables.iter().all(|t| catalog.has_table(t)),
            None => actual.tables.is_subset(&expected.tables),
        }
    }

    fn fields_match(&self, expected: &QueryReferences, actual: &QueryReferences) -> bool {
        if expected.columns != actual.columns {
            return false;
        }
        match &self.catalog {
            Some(catalog) => actual
                .columns
                .iter()
                .all(|c| catalog.has_column(&actual.tables, c)),
            None => true,
        }
    }
}

impl Metric for StructuredQueryMetric {
    fn key(&self) -> &'static str {
        "structured_query"
    }

    fn calculate(&self, expected: &str, actual: &str, _similarity: f32) -> MetricScore {
        let actual_parsed = parse(actual);
        let expected_refs = parse(expected).map(|s| references(&s)).unwrap_or_default();

        let (entity_exists, fields_match) = actual_parsed.as_ref().map_or((false, false), |s| {
            let actual_refs = references(s);
            (
                self.entity_exists(&expected_refs, &actual_refs),
                self.fields_match(&expected_refs, &actual_refs),
            )
        });
        let overlap = token_overlap(expected, actual);
        let overlap_ok = overlap >= KEYWORD_OVERLAP_THRESHOLD;
        let parseable = actual_parsed.is_some();
        let balanced = balanced_syntax(actual);

        let checks = [entity_exists, fields_match, overlap_ok, parseable, balanced];
        let overall = checks.iter().map(|&c| flag(c)).sum::<f64>() / 5.0;

        let mut breakdown = BTreeMap::new();
        breakdown.insert("entity_exists".to_string(), flag(entity_exists));
        breakdown.insert("fields_match".to_string(), flag(fields_match));
        breakdown.insert("keyword_overlap".to_string(), overlap);
        breakdown.insert("keyword_overlap_ok".to_string(), flag(overlap_ok));
        breakdown.insert("parseable".to_string(), flag(parseable));
        breakdown.insert("balanced_syntax".to_string(), flag(balanced));
        MetricScore::new(overall, breakdown)
    }
}
