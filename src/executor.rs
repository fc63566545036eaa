//! Sequential statement executor.
//!
//! Runs statements one at a time, in order, over a single connection owned by
//! the caller. The first failure stops the run; earlier statements stay
//! applied unless the caller wrapped the run in a transaction.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Executor, PgConnection};
use tracing::{debug, info, warn};

use crate::error::{Result, ScriptError};
use crate::splitter::Statement;

/// Number of characters of a statement shown in progress lines and errors.
pub const PREVIEW_CHARS: usize = 120;

/// A handle that can run one SQL command string.
#[async_trait]
pub trait SqlConnection: Send {
    /// Error reported by the database for a rejected command.
    type Error: fmt::Display + Send;

    /// Run a single command and return the number of rows it affected.
    async fn execute_sql(&mut self, sql: &str) -> std::result::Result<u64, Self::Error>;

    /// Whether `err` means the connection itself broke, rather than the
    /// database rejecting the command.
    fn is_connection_error(&self, _err: &Self::Error) -> bool {
        false
    }
}

#[async_trait]
impl SqlConnection for PgConnection {
    type Error = sqlx::Error;

    async fn execute_sql(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        // Simple query protocol: DDL, DO blocks and function bodies go verbatim.
        let conn: &mut PgConnection = self;
        let result = Executor::execute(conn, sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }

    fn is_connection_error(&self, err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::PoolClosed
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::WorkerCrashed
        )
    }
}

/// Observation hook called with `(index, statement)` before each attempt.
pub type Progress<'a> = dyn FnMut(usize, &Statement) + Send + 'a;

/// Summary of a run in which every statement succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Statements executed.
    pub executed: usize,
    /// Sum of rows affected as reported by the database.
    pub rows_affected: u64,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Execute `statements` in order, stopping at the first failure.
///
/// Returns [`ScriptError::Execution`] carrying the index of the failing
/// statement, or [`ScriptError::Connection`] when the connection broke
/// underneath it. Nothing after it is attempted and nothing before it is
/// undone.
pub async fn execute_statements<C>(
    conn: &mut C,
    statements: &[Statement],
    mut on_progress: Option<&mut Progress<'_>>,
) -> Result<ExecutionReport>
where
    C: SqlConnection + ?Sized,
{
    let started = Instant::now();
    let mut rows_affected = 0;

    for (index, statement) in statements.iter().enumerate() {
        if let Some(progress) = on_progress.as_deref_mut() {
            progress(index, statement);
        }

        debug!(index, line = statement.line, "executing statement");
        match conn.execute_sql(&statement.text).await {
            Ok(rows) => rows_affected += rows,
            Err(e) if conn.is_connection_error(&e) => {
                warn!(index, line = statement.line, error = %e, "connection lost");
                return Err(ScriptError::Connection(format!(
                    "lost while running statement {} (line {}): {}",
                    index + 1,
                    statement.line,
                    e
                )));
            }
            Err(e) => {
                warn!(index, line = statement.line, error = %e, "statement failed");
                return Err(ScriptError::Execution {
                    index,
                    line: statement.line,
                    snippet: statement.preview(PREVIEW_CHARS),
                    message: e.to_string(),
                });
            }
        }
    }

    let report = ExecutionReport {
        executed: statements.len(),
        rows_affected,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        executed = report.executed,
        rows_affected = report.rows_affected,
        elapsed_ms = report.elapsed_ms,
        "script executed"
    );
    Ok(report)
}

/// Dry-run `statements` inside a transaction that is always rolled back.
///
/// Locates the first failing statement of a script without applying
/// anything. A script that commits on its own (`COMMIT;`) ends the
/// surrounding transaction early, so whatever ran before it stays applied.
pub async fn check_statements<C>(
    conn: &mut C,
    statements: &[Statement],
    on_progress: Option<&mut Progress<'_>>,
) -> Result<ExecutionReport>
where
    C: SqlConnection + ?Sized,
{
    conn.execute_sql("BEGIN")
        .await
        .map_err(|e| ScriptError::Connection(format!("cannot open transaction: {}", e)))?;

    let outcome = execute_statements(&mut *conn, statements, on_progress).await;

    if let Err(e) = conn.execute_sql("ROLLBACK").await {
        warn!(error = %e, "rollback after check failed");
        // The statement error is the more useful one to surface.
        if outcome.is_ok() {
            return Err(ScriptError::Connection(format!("rollback failed: {}", e)));
        }
    }

    outcome
}
