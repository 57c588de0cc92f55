//! SQL text for partition DDL and catalog queries
//!
//! Identifiers cannot be bound as parameters, so every identifier is validated
//! against `[A-Za-z_][A-Za-z0-9_]*` and double-quoted before it is interpolated.
//! Dates are rendered from typed values, never from caller-provided text.

use partkeeper_core::partition::validate_identifier;
use partkeeper_core::{ArchivalPolicy, PartitionSpec, Result};

/// Schema holding the monthly archive tables
pub const ARCHIVE_SCHEMA: &str = "archive";

/// Whether a relation with this name is a partition of the parent.
/// Binds: `$1` schema, `$2` parent table, `$3` partition.
pub const PARTITION_EXISTS: &str = r#"
    SELECT EXISTS (
        SELECT 1
        FROM pg_inherits i
        JOIN pg_class child ON child.oid = i.inhrelid
        JOIN pg_class parent ON parent.oid = i.inhparent
        JOIN pg_namespace n ON n.oid = parent.relnamespace
        WHERE n.nspname = $1 AND parent.relname = $2 AND child.relname = $3
    )
"#;

/// Direct partitions of a parent with their bound expressions.
/// `reltuples` is negative when the relation was never analyzed.
/// Binds: `$1` schema, `$2` parent table.
pub const LIST_PARTITIONS: &str = r#"
    SELECT
        child.relname::TEXT AS partition_name,
        pg_get_expr(child.relpartbound, child.oid) AS bound_expression,
        CASE WHEN child.reltuples < 0 THEN NULL ELSE child.reltuples::BIGINT END AS row_count,
        pg_total_relation_size(child.oid) AS size_bytes
    FROM pg_inherits i
    JOIN pg_class child ON child.oid = i.inhrelid
    JOIN pg_class parent ON parent.oid = i.inhparent
    JOIN pg_namespace n ON n.oid = parent.relnamespace
    WHERE n.nspname = $1 AND parent.relname = $2
    ORDER BY child.relname
"#;

/// Whether a relation exists. Binds: `$1` quoted qualified name.
pub const RELATION_EXISTS: &str = "SELECT to_regclass($1) IS NOT NULL";

/// Estimated rows and physical size summed over the leaves of a partition tree.
/// Binds: `$1` quoted qualified name.
pub const TABLE_STATS: &str = r#"
    SELECT
        COALESCE(SUM(GREATEST(c.reltuples, 0)), 0)::BIGINT AS row_count,
        COALESCE(SUM(pg_total_relation_size(t.relid)), 0)::BIGINT AS size_bytes
    FROM pg_partition_tree(to_regclass($1)) t
    JOIN pg_class c ON c.oid = t.relid
    WHERE t.isleaf
"#;

/// Double-quote a validated identifier
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// `"schema"."name"`
pub fn qualified(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(name)?))
}

/// `CREATE TABLE ... PARTITION OF ...` for one month
pub fn create_partition(schema: &str, spec: &PartitionSpec) -> Result<String> {
    Ok(format!(
        "CREATE TABLE {} PARTITION OF {} FOR VALUES FROM ('{}') TO ('{}')",
        qualified(schema, &spec.partition_name)?,
        qualified(schema, &spec.table_name)?,
        spec.start_date.format("%Y-%m-%d"),
        spec.end_date.format("%Y-%m-%d"),
    ))
}

/// Drop a partition together with dependent objects
pub fn drop_partition(schema: &str, partition_name: &str) -> Result<String> {
    Ok(format!(
        "DROP TABLE IF EXISTS {} CASCADE",
        qualified(schema, partition_name)?
    ))
}

/// Exact row count of one relation
pub fn count_rows(schema: &str, table_name: &str) -> Result<String> {
    Ok(format!("SELECT COUNT(*) FROM {}", qualified(schema, table_name)?))
}

/// Statements creating the archive schema and the policy's archive table
pub fn ensure_archive_table(policy: &ArchivalPolicy) -> Result<Vec<String>> {
    Ok(vec![
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(ARCHIVE_SCHEMA)?),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    user_id TEXT NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    total_minutes BIGINT NOT NULL,
    session_count BIGINT NOT NULL,
    average_focus_score DOUBLE PRECISION,
    last_activity TIMESTAMPTZ NOT NULL,
    archived_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (user_id, year, month)
)"#,
            qualified(ARCHIVE_SCHEMA, &policy.archive_table_name())?
        ),
    ])
}

/// Monthly aggregate upsert of rows before `$1` (a `DATE`); existing keys are kept
pub fn archive_upsert(schema: &str, policy: &ArchivalPolicy) -> Result<String> {
    let columns = &policy.columns;
    let user_id = quote_ident(&columns.user_id)?;
    let timestamp = quote_ident(&columns.timestamp)?;
    let minutes = quote_ident(&columns.minutes)?;
    let focus = match &columns.focus_score {
        Some(column) => format!("AVG({})::DOUBLE PRECISION", quote_ident(column)?),
        None => "NULL::DOUBLE PRECISION".to_string(),
    };

    Ok(format!(
        r#"INSERT INTO {target} (user_id, year, month, total_minutes, session_count, average_focus_score, last_activity)
SELECT
    {user_id}::TEXT,
    EXTRACT(YEAR FROM {timestamp})::INTEGER,
    EXTRACT(MONTH FROM {timestamp})::INTEGER,
    COALESCE(SUM({minutes}), 0)::BIGINT,
    COUNT(*)::BIGINT,
    {focus},
    MAX({timestamp})
FROM {source}
WHERE {timestamp} < $1
GROUP BY 1, 2, 3
ON CONFLICT (user_id, year, month) DO NOTHING"#,
        target = qualified(ARCHIVE_SCHEMA, &policy.archive_table_name())?,
        source = qualified(schema, &policy.table_name)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use partkeeper_core::ArchiveColumns;

    fn policy(focus_score: Option<&str>) -> ArchivalPolicy {
        ArchivalPolicy {
            table_name: "StudySession".to_string(),
            enabled: true,
            horizon_days: 365,
            columns: ArchiveColumns {
                focus_score: focus_score.map(str::to_string),
                ..ArchiveColumns::default()
            },
        }
    }

    #[test]
    fn test_quote_ident_rejects_injection() {
        assert_eq!(quote_ident("StudySession").unwrap(), "\"StudySession\"");
        assert!(quote_ident("x\"; DROP TABLE users; --").is_err());
        assert!(quote_ident("public.users").is_err());
    }

    #[test]
    fn test_create_partition() {
        let month = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let spec = PartitionSpec::for_month("StudySession", month).unwrap();

        assert_eq!(
            create_partition("public", &spec).unwrap(),
            "CREATE TABLE \"public\".\"StudySession_2025_03\" PARTITION OF \"public\".\"StudySession\" \
             FOR VALUES FROM ('2025-03-01') TO ('2025-04-01')"
        );
    }

    #[test]
    fn test_drop_partition() {
        assert_eq!(
            drop_partition("app", "ActivityLog_2024_01").unwrap(),
            "DROP TABLE IF EXISTS \"app\".\"ActivityLog_2024_01\" CASCADE"
        );
        assert!(drop_partition("app", "bad name").is_err());
    }

    #[test]
    fn test_ensure_archive_table() {
        let statements = ensure_archive_table(&policy(Some("focusScore"))).unwrap();
        assert_eq!(statements[0], "CREATE SCHEMA IF NOT EXISTS \"archive\"");
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS \"archive\".\"studysession_monthly\""));
        assert!(statements[1].contains("PRIMARY KEY (user_id, year, month)"));
    }

    #[test]
    fn test_archive_upsert_uses_mapped_columns() {
        let sql = archive_upsert("public", &policy(Some("focusScore"))).unwrap();
        assert!(sql.starts_with("INSERT INTO \"archive\".\"studysession_monthly\""));
        assert!(sql.contains("FROM \"public\".\"StudySession\""));
        assert!(sql.contains("SUM(\"duration\")"));
        assert!(sql.contains("AVG(\"focusScore\")"));
        assert!(sql.contains("WHERE \"startTime\" < $1"));
        assert!(sql.ends_with("ON CONFLICT (user_id, year, month) DO NOTHING"));
    }

    #[test]
    fn test_archive_upsert_without_focus_column() {
        let sql = archive_upsert("public", &policy(None)).unwrap();
        assert!(sql.contains("NULL::DOUBLE PRECISION"));
        assert!(!sql.contains("AVG("));
    }
}
