//! Database-level tools.
//!
//! Tools: sqlscript_db_ping

use serde_json::{Map, Value as JsonValue};
use std::time::Instant;

use crate::error::{Result, ScriptError};
use crate::executor::SqlConnection;
use crate::schema;
use crate::session::McpSession;
use crate::tools::{close_connection, ToolDef};

/// Get all database tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![ToolDef::new(
        "sqlscript_db_ping",
        "Open a connection to the configured database and run SELECT 1 to check connectivity",
        schema!(object {}),
    )]
}

/// Dispatch a database tool call.
pub async fn dispatch(
    session: &mut McpSession,
    name: &str,
    _args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "sqlscript_db_ping" => {
            let started = Instant::now();
            let mut conn = session.connect().await?;
            let outcome = conn.execute_sql("SELECT 1").await;
            close_connection(conn).await;

            outcome.map_err(|e| ScriptError::Connection(e.to_string()))?;
            Ok(serde_json::json!({
                "ok": true,
                "elapsed_ms": started.elapsed().as_millis() as u64,
            }))
        }
        _ => Err(ScriptError::UnknownTool(name.to_string())),
    }
}
