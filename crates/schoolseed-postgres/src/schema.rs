//! DDL helpers used by `create-tables` and `delete-tables`.

use sqlx::PgPool;
use tracing::{info, warn};

/// A statement the server rejected.
#[derive(Debug, Clone)]
pub struct DdlFailure {
    pub statement: String,
    pub error: String,
}

/// Outcome of [`apply_ddl`]; failed statements do not stop the script.
#[derive(Debug, Clone, Default)]
pub struct DdlReport {
    pub applied: usize,
    pub failed: Vec<DdlFailure>,
}

impl DdlReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Splits a script on `;`, dropping `--` comment lines and empty statements.
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Runs each statement of `script` in order, logging and collecting failures.
pub async fn apply_ddl(pool: &PgPool, script: &str) -> DdlReport {
    let mut report = DdlReport::default();
    for statement in split_statements(script) {
        let label = statement_label(&statement);
        match sqlx::query(&statement).execute(pool).await {
            Ok(_) => {
                info!(statement = %label, "ddl applied");
                report.applied += 1;
            }
            Err(err) => {
                warn!(statement = %label, error = %err, "ddl failed");
                report.failed.push(DdlFailure {
                    statement,
                    error: err.to_string(),
                });
            }
        }
    }
    report
}

/// Drops every table of the current schema. Returns the dropped names.
pub async fn drop_tables(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let tables: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT tablename::text
        FROM pg_catalog.pg_tables
        WHERE schemaname = current_schema()
        ORDER BY tablename
        "#,
    )
    .fetch_all(pool)
    .await?;

    for table in &tables {
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table));
        sqlx::query(&sql).execute(pool).await?;
        info!(table = %table, "table dropped");
    }
    Ok(tables)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// First line of a statement, for logs.
fn statement_label(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement).trim()
}
