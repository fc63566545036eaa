//! Script execution tools.
//!
//! Tools: sqlscript_apply, sqlscript_check

use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::convert::{get_script_arg, report_to_json};
use crate::error::{Result, ScriptError};
use crate::executor::{check_statements, execute_statements, ExecutionReport};
use crate::session::McpSession;
use crate::splitter::{parse_statements, Statement};
use crate::tools::{close_connection, script_schema, ToolDef};

/// Get all execution tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "sqlscript_apply",
            "Run every statement of a SQL script against the configured database, one at a time \
             and in order. Stops at the first failing statement; statements before it stay \
             applied. Rejected when the server is read-only.",
            script_schema(),
        ),
        ToolDef::new(
            "sqlscript_check",
            "Dry-run a SQL script inside a transaction that is always rolled back. Returns \
             {ok:true, executed} or {ok:false, failed_index, line, statement, message} to \
             pinpoint the first statement the database rejects.",
            script_schema(),
        ),
    ]
}

/// Dispatch an execution tool call.
pub async fn dispatch(
    session: &mut McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "sqlscript_apply" => {
            session.ensure_writable(name)?;
            let script = get_script_arg(&args)?;
            let statements = parse_statements(&script)?;

            let mut conn = session.connect().await?;
            let outcome = execute_statements(&mut conn, &statements, None).await;
            close_connection(conn).await;

            let report = outcome?;
            Ok(report_to_json(&report, statements.len()))
        }

        "sqlscript_check" => {
            let script = get_script_arg(&args)?;
            let statements = parse_statements(&script)?;

            let mut conn = session.connect().await?;
            let outcome = check_statements(&mut conn, &statements, None).await;
            close_connection(conn).await;

            check_outcome_to_json(outcome, &statements)
        }

        _ => Err(ScriptError::UnknownTool(name.to_string())),
    }
}

/// A rejected statement is a successful check; only other failures are errors.
fn check_outcome_to_json(
    outcome: Result<ExecutionReport>,
    statements: &[Statement],
) -> Result<JsonValue> {
    match outcome {
        Ok(report) => Ok(serde_json::json!({
            "ok": true,
            "executed": report.executed,
            "total": statements.len(),
        })),
        Err(ScriptError::Execution {
            index,
            line,
            message,
            ..
        }) => {
            info!(index, line, "check found failing statement");
            Ok(serde_json::json!({
                "ok": false,
                "failed_index": index,
                "line": line,
                "statement": statements[index].text,
                "message": message,
            }))
        }
        Err(e) => Err(e),
    }
}
