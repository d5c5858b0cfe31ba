//! Dialect-aware SQL text generation.
//!
//! Identifier quoting, column type inference for `CREATE TABLE`, and the
//! select list used to read a table with every column cast to a decodable
//! wire type. Values never appear in generated SQL; they are bound.

use crate::models::{Column, ColumnKind, effective_limit};

/// SQL dialects spoken by the relational and warehouse providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    Redshift,
    MySql,
    Snowflake,
    BigQuery,
}

impl SqlDialect {
    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote(&self, ident: &str) -> String {
        let q = match self {
            SqlDialect::MySql | SqlDialect::BigQuery => '`',
            _ => '"',
        };
        let escaped = ident.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Quotes each dot-separated part of a qualified name.
    pub fn qualify(&self, parts: &[&str]) -> String {
        match self {
            // BigQuery quotes the full path as one identifier
            SqlDialect::BigQuery => self.quote(&parts.join(".")),
            _ => parts
                .iter()
                .map(|part| self.quote(part))
                .collect::<Vec<_>>()
                .join("."),
        }
    }

    /// Storage type for a column of `kind` when creating a table.
    pub fn column_type(&self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            // Warehouse loads are text-typed; the engine casts on query.
            (SqlDialect::Snowflake, _) => "STRING",
            (SqlDialect::BigQuery, ColumnKind::Integer) => "INT64",
            (SqlDialect::BigQuery, ColumnKind::Float) => "FLOAT64",
            (SqlDialect::BigQuery, ColumnKind::Boolean) => "BOOL",
            (SqlDialect::BigQuery, _) => "STRING",
            (SqlDialect::Sqlite, ColumnKind::Integer) => "INTEGER",
            (SqlDialect::Sqlite, ColumnKind::Boolean) => "BOOLEAN",
            (SqlDialect::Sqlite, ColumnKind::Float) => "REAL",
            (SqlDialect::Sqlite, _) => "TEXT",
            (SqlDialect::Postgres | SqlDialect::Redshift | SqlDialect::MySql, ColumnKind::Integer) => {
                "BIGINT"
            }
            (SqlDialect::MySql, ColumnKind::Float) => "DOUBLE",
            (SqlDialect::Postgres | SqlDialect::Redshift, ColumnKind::Float) => "DOUBLE PRECISION",
            (SqlDialect::Postgres | SqlDialect::Redshift | SqlDialect::MySql, ColumnKind::Boolean) => {
                "BOOLEAN"
            }
            (SqlDialect::Redshift, _) => "VARCHAR(65535)",
            (SqlDialect::MySql, _) => "LONGTEXT",
            (SqlDialect::Postgres, _) => "TEXT",
        }
    }

    /// Text type used when casting a column for reading
    fn text_cast_type(&self) -> &'static str {
        match self {
            SqlDialect::Redshift => "VARCHAR(65535)",
            SqlDialect::MySql => "CHAR",
            SqlDialect::BigQuery | SqlDialect::Snowflake => "STRING",
            SqlDialect::Sqlite | SqlDialect::Postgres => "TEXT",
        }
    }

    /// Select-list entry reading `column` as the wire type of its kind.
    pub fn cast_column(&self, column: &Column) -> String {
        let quoted = self.quote(&column.name);
        let target = match (self, column.kind) {
            (SqlDialect::MySql, ColumnKind::Integer | ColumnKind::Boolean) => "SIGNED",
            (SqlDialect::MySql, ColumnKind::Float) => "DOUBLE",
            (_, ColumnKind::Integer) => "BIGINT",
            (_, ColumnKind::Float) => "DOUBLE PRECISION",
            (_, ColumnKind::Boolean) => return quoted,
            _ => self.text_cast_type(),
        };
        format!("CAST({quoted} AS {target}) AS {quoted}")
    }

    /// `CREATE TABLE` statement for a recordset header.
    pub fn create_table(&self, table: &str, columns: &[Column], if_not_exists: bool) -> String {
        self.create_table_with_untyped(table, columns, &[], if_not_exists)
    }

    /// `CREATE TABLE` where the columns flagged in `untyped` get no declared
    /// type. SQLite then stores each value with its own storage class.
    pub fn create_table_with_untyped(
        &self,
        table: &str,
        columns: &[Column],
        untyped: &[bool],
        if_not_exists: bool,
    ) -> String {
        let definitions = columns
            .iter()
            .enumerate()
            .map(|(i, c)| match untyped.get(i) {
                Some(true) => self.quote(&c.name),
                _ => format!("{} {}", self.quote(&c.name), self.column_type(c.kind)),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        format!("CREATE TABLE {guard}{table} ({definitions})")
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {table}")
    }

    /// `SELECT` over `select_list` with an optional positive limit.
    pub fn select(&self, table: &str, select_list: &str, limit: Option<usize>) -> String {
        match effective_limit(limit) {
            Some(n) => format!("SELECT {select_list} FROM {table} LIMIT {n}"),
            None => format!("SELECT {select_list} FROM {table}"),
        }
    }

    /// `DELETE` with a trusted raw predicate passed through verbatim.
    pub fn delete(&self, table: &str, predicate: Option<&str>) -> String {
        match predicate.map(str::trim).filter(|p| !p.is_empty()) {
            Some(predicate) => format!("DELETE FROM {table} WHERE {predicate}"),
            None if matches!(self, SqlDialect::BigQuery) => {
                format!("DELETE FROM {table} WHERE TRUE")
            }
            None => format!("DELETE FROM {table}"),
        }
    }

    /// `INSERT ... (cols) ` prefix for a multi-row values list.
    pub fn insert_prefix(&self, table: &str, columns: &[Column]) -> String {
        let names = columns
            .iter()
            .map(|c| self.quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {table} ({names}) ")
    }
}

/// Maps a declared or reported SQL type name to a column kind.
///
/// Works for SQLite declared types (affinity rules), `information_schema`
/// data types of PostgreSQL, Redshift and MySQL, and warehouse schema types.
pub fn kind_from_type_name(type_name: &str) -> ColumnKind {
    let t = type_name.trim().to_ascii_lowercase();
    if t.is_empty() {
        return ColumnKind::Unknown;
    }
    if t == "tinyint(1)" || t.starts_with("bool") {
        return ColumnKind::Boolean;
    }
    if t.contains("time") || t.starts_with("date") || t.starts_with("interval") {
        return ColumnKind::Timestamp;
    }
    if t.contains("int") && !t.contains("point") {
        return ColumnKind::Integer;
    }
    if t.contains("json") || t == "record" || t == "struct" || t == "variant" || t == "object" {
        return ColumnKind::Json;
    }
    if t.contains("real")
        || t.contains("floa")
        || t.contains("doub")
        || t.starts_with("numeric")
        || t.starts_with("decimal")
        || t.starts_with("bignumeric")
    {
        return ColumnKind::Float;
    }
    ColumnKind::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<Column> {
        vec![
            Column::new("id", ColumnKind::Integer),
            Column::new("note", ColumnKind::Text),
        ]
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(SqlDialect::Postgres.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(SqlDialect::MySql.quote("a`b"), "`a``b`");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(SqlDialect::Postgres.qualify(&["public", "t"]), "\"public\".\"t\"");
        assert_eq!(
            SqlDialect::BigQuery.qualify(&["p", "d", "t"]),
            "`p.d.t`"
        );
    }

    #[test]
    fn test_create_table_per_dialect() {
        assert_eq!(
            SqlDialect::Sqlite.create_table("\"t\"", &header(), false),
            "CREATE TABLE \"t\" (\"id\" INTEGER, \"note\" TEXT)"
        );
        assert_eq!(
            SqlDialect::Snowflake.create_table("\"t\"", &header(), true),
            "CREATE TABLE IF NOT EXISTS \"t\" (\"id\" STRING, \"note\" STRING)"
        );
        assert_eq!(
            SqlDialect::Redshift.create_table("\"t\"", &header(), true),
            "CREATE TABLE IF NOT EXISTS \"t\" (\"id\" BIGINT, \"note\" VARCHAR(65535))"
        );
    }

    #[test]
    fn test_create_table_leaves_flagged_columns_untyped() {
        assert_eq!(
            SqlDialect::Sqlite.create_table_with_untyped("\"t\"", &header(), &[false, true], false),
            "CREATE TABLE \"t\" (\"id\" INTEGER, \"note\")"
        );
    }

    #[test]
    fn test_cast_column() {
        let id = Column::new("id", ColumnKind::Integer);
        let at = Column::new("at", ColumnKind::Timestamp);
        assert_eq!(SqlDialect::Postgres.cast_column(&id), "CAST(\"id\" AS BIGINT) AS \"id\"");
        assert_eq!(SqlDialect::MySql.cast_column(&id), "CAST(`id` AS SIGNED) AS `id`");
        assert_eq!(SqlDialect::MySql.cast_column(&at), "CAST(`at` AS CHAR) AS `at`");
        assert_eq!(
            SqlDialect::MySql.cast_column(&Column::new("ok", ColumnKind::Boolean)),
            "CAST(`ok` AS SIGNED) AS `ok`"
        );
        assert_eq!(
            SqlDialect::Postgres.cast_column(&Column::new("ok", ColumnKind::Boolean)),
            "\"ok\""
        );
    }

    #[test]
    fn test_select_limit() {
        assert_eq!(SqlDialect::Postgres.select("t", "*", Some(5)), "SELECT * FROM t LIMIT 5");
        assert_eq!(SqlDialect::Postgres.select("t", "*", Some(0)), "SELECT * FROM t");
    }

    #[test]
    fn test_delete_passes_predicate_verbatim() {
        assert_eq!(
            SqlDialect::Sqlite.delete("t", Some("id > 3 AND note IS NULL")),
            "DELETE FROM t WHERE id > 3 AND note IS NULL"
        );
        assert_eq!(SqlDialect::Sqlite.delete("t", None), "DELETE FROM t");
        assert_eq!(SqlDialect::BigQuery.delete("t", Some("  ")), "DELETE FROM t WHERE TRUE");
    }

    #[test]
    fn test_kind_from_type_name() {
        assert_eq!(kind_from_type_name("INTEGER"), ColumnKind::Integer);
        assert_eq!(kind_from_type_name("character varying"), ColumnKind::Text);
        assert_eq!(kind_from_type_name("double precision"), ColumnKind::Float);
        assert_eq!(kind_from_type_name("numeric"), ColumnKind::Float);
        assert_eq!(kind_from_type_name("timestamp without time zone"), ColumnKind::Timestamp);
        assert_eq!(kind_from_type_name("jsonb"), ColumnKind::Json);
        assert_eq!(kind_from_type_name("tinyint(1)"), ColumnKind::Boolean);
        assert_eq!(kind_from_type_name("BOOL"), ColumnKind::Boolean);
        assert_eq!(kind_from_type_name("point"), ColumnKind::Text);
        assert_eq!(kind_from_type_name(""), ColumnKind::Unknown);
    }
}
