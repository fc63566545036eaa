//! Conversion helpers between JSON tool arguments and script types.

use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{Result, ScriptError};
use crate::executor::ExecutionReport;
use crate::splitter::{read_script, Statement};

/// Helper to get an optional string argument from JSON arguments.
pub fn get_optional_string(args: &Map<String, JsonValue>, name: &str) -> Option<String> {
    args.get(name).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Resolve the script text of a tool call.
///
/// Exactly one of `sql` (inline text) or `path` (file to read) must be given.
pub fn get_script_arg(args: &Map<String, JsonValue>) -> Result<String> {
    match (get_optional_string(args, "sql"), get_optional_string(args, "path")) {
        (Some(sql), None) => Ok(sql),
        (None, Some(path)) => read_script(Path::new(&path)),
        (Some(_), Some(_)) => Err(ScriptError::InvalidArg {
            name: "sql".to_string(),
            reason: "pass either 'sql' or 'path', not both".to_string(),
        }),
        (None, None) => Err(ScriptError::MissingArg("sql or path".to_string())),
    }
}

/// Convert a statement to JSON for MCP responses.
pub fn statement_to_json(statement: &Statement) -> JsonValue {
    serde_json::json!({
        "index": statement.index,
        "line": statement.line,
        "text": statement.text,
    })
}

/// Convert a split result to JSON for MCP responses.
pub fn statements_to_json(statements: &[Statement]) -> JsonValue {
    serde_json::json!({
        "count": statements.len(),
        "statements": statements.iter().map(statement_to_json).collect::<Vec<_>>(),
    })
}

/// Convert an execution report to JSON for MCP responses.
pub fn report_to_json(report: &ExecutionReport, total: usize) -> JsonValue {
    serde_json::json!({
        "executed": report.executed,
        "total": total,
        "rows_affected": report.rows_affected,
        "elapsed_ms": report.elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_script_from_inline_sql() {
        let sql = get_script_arg(&args(json!({"sql": "SELECT 1;"}))).unwrap();
        assert_eq!(sql, "SELECT 1;");
    }

    #[test]
    fn test_script_requires_exactly_one_source() {
        assert!(matches!(
            get_script_arg(&args(json!({}))),
            Err(ScriptError::MissingArg(_))
        ));
        assert!(matches!(
            get_script_arg(&args(json!({"sql": "SELECT 1;", "path": "x.sql"}))),
            Err(ScriptError::InvalidArg { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_usage_error() {
        let result = get_script_arg(&args(json!({"path": "/nonexistent/migration.sql"})));
        assert!(matches!(result, Err(ScriptError::Usage(_))));
    }
}
