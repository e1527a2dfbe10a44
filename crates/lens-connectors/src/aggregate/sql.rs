//! SQL text for sampling, counting, and aggregate pushdown.
//!
//! The builders are pure so both dialects can be tested without a server.
//! Identifiers are quoted with embedded quote characters doubled; values
//! (row limits) are always bound as parameters.

use super::{AggregationRequest, Reduction, RANKED_LIMIT, UNKNOWN_LABEL};

/// SQL dialect of a relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// `PostgreSQL`: double-quoted identifiers, `$n` placeholders.
    Postgres,
    /// `MySQL`: backtick-quoted identifiers, `?` placeholders.
    MySql,
}

impl SqlDialect {
    const fn quote_char(self) -> char {
        match self {
            Self::Postgres => '"',
            Self::MySql => '`',
        }
    }

    /// Placeholder for the first bound parameter.
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Postgres => "$1",
            Self::MySql => "?",
        }
    }

    const fn text_type(self) -> &'static str {
        match self {
            Self::Postgres => "TEXT",
            Self::MySql => "CHAR",
        }
    }

    const fn double_type(self) -> &'static str {
        match self {
            Self::Postgres => "DOUBLE PRECISION",
            Self::MySql => "DOUBLE",
        }
    }

    /// Quotes a single identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote_ident(self, ident: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for ch in ident.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    /// Quotes a possibly schema-qualified table name (`schema.table`),
    /// quoting each part separately.
    #[must_use]
    pub fn quote_table(self, table: &str) -> String {
        table
            .split('.')
            .map(|part| self.quote_ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// `SELECT * FROM <table> LIMIT <param>`; the limit is bound by the caller.
#[must_use]
pub fn build_sample_query(dialect: SqlDialect, table: &str) -> String {
    format!(
        "SELECT * FROM {} LIMIT {}",
        dialect.quote_table(table),
        dialect.placeholder()
    )
}

/// `SELECT COUNT(*) FROM <table>`.
#[must_use]
pub fn build_count_query(dialect: SqlDialect, table: &str) -> String {
    format!("SELECT COUNT(*) AS count FROM {}", dialect.quote_table(table))
}

/// Ranked aggregate query: one row per group, columns `label` and `value`,
/// value-descending, at most [`RANKED_LIMIT`] rows.
///
/// Null group keys come back as `'Unknown'`; `value` is always a double so
/// both dialects decode it the same way. A group with no non-null values
/// sums to 0 rather than NULL, which Postgres would sort first.
#[must_use]
pub fn build_aggregate_query(
    dialect: SqlDialect,
    table: &str,
    request: &AggregationRequest,
) -> String {
    let group = dialect.quote_ident(&request.group_field);
    let agg = match request.reduction() {
        Reduction::Count => "COUNT(*)".to_string(),
        Reduction::Sum(field) => format!("COALESCE(SUM({}), 0)", dialect.quote_ident(&field)),
    };
    format!(
        "SELECT COALESCE(CAST({group} AS {text}), '{UNKNOWN_LABEL}') AS label, \
         CAST({agg} AS {double}) AS value \
         FROM {table} GROUP BY {group} ORDER BY value DESC LIMIT {RANKED_LIMIT}",
        text = dialect.text_type(),
        double = dialect.double_type(),
        table = dialect.quote_table(table),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ChartKind;

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(SqlDialect::Postgres.quote_ident("city"), "\"city\"");
        assert_eq!(SqlDialect::Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(SqlDialect::MySql.quote_ident("a`b"), "`a``b`");
        assert_eq!(SqlDialect::MySql.quote_ident("a\"b"), "`a\"b`");
    }

    #[test]
    fn test_quote_table_qualified() {
        assert_eq!(
            SqlDialect::Postgres.quote_table("public.orders"),
            "\"public\".\"orders\""
        );
        assert_eq!(SqlDialect::MySql.quote_table("orders"), "`orders`");
    }

    #[test]
    fn test_sample_and_count_queries() {
        assert_eq!(
            build_sample_query(SqlDialect::Postgres, "orders"),
            "SELECT * FROM \"orders\" LIMIT $1"
        );
        assert_eq!(
            build_sample_query(SqlDialect::MySql, "orders"),
            "SELECT * FROM `orders` LIMIT ?"
        );
        assert_eq!(
            build_count_query(SqlDialect::MySql, "orders"),
            "SELECT COUNT(*) AS count FROM `orders`"
        );
    }

    #[test]
    fn test_postgres_sum_query() {
        let req = AggregationRequest::new("region", Some("revenue".into()), ChartKind::Bar);
        let sql = build_aggregate_query(SqlDialect::Postgres, "sales", &req);
        assert_eq!(
            sql,
            "SELECT COALESCE(CAST(\"region\" AS TEXT), 'Unknown') AS label, \
             CAST(COALESCE(SUM(\"revenue\"), 0) AS DOUBLE PRECISION) AS value \
             FROM \"sales\" GROUP BY \"region\" ORDER BY value DESC LIMIT 50"
        );
    }

    #[test]
    fn test_all_null_sum_ranks_as_zero() {
        for dialect in [SqlDialect::Postgres, SqlDialect::MySql] {
            let req = AggregationRequest::new("region", Some("revenue".into()), ChartKind::Line);
            let sql = build_aggregate_query(dialect, "sales", &req);
            let coalesced = format!("COALESCE(SUM({}), 0)", dialect.quote_ident("revenue"));
            assert!(sql.contains(&coalesced), "{sql}");
            assert!(!sql.contains("CAST(SUM("));
        }
    }

    #[test]
    fn test_mysql_pie_counts() {
        let req = AggregationRequest::new("region", Some("revenue".into()), ChartKind::Pie);
        let sql = build_aggregate_query(SqlDialect::MySql, "sales", &req);
        assert!(sql.contains("CAST(COUNT(*) AS DOUBLE)"));
        assert!(sql.contains("CAST(`region` AS CHAR)"));
        assert!(!sql.contains("revenue"));
        assert!(sql.ends_with("LIMIT 50"));
    }
}
