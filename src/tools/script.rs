//! Script splitting tools.
//!
//! Tools: sqlscript_split

use serde_json::{Map, Value as JsonValue};

use crate::convert::{get_script_arg, statements_to_json};
use crate::error::{Result, ScriptError};
use crate::session::McpSession;
use crate::splitter::parse_statements;
use crate::tools::{script_schema, ToolDef};

/// Get all script tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![ToolDef::new(
        "sqlscript_split",
        "Split a SQL script into standalone statements. Semicolons inside string literals, \
         quoted identifiers, dollar-quoted blocks and comments do not split. Pass the script \
         inline as 'sql' or as a file 'path'. Returns {count, statements:[{index, line, text}]}.",
        script_schema(),
    )]
}

/// Dispatch a script tool call.
pub fn dispatch(
    _session: &mut McpSession,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        "sqlscript_split" => {
            let script = get_script_arg(&args)?;
            let statements = parse_statements(&script)?;
            Ok(statements_to_json(&statements))
        }
        _ => Err(ScriptError::UnknownTool(name.to_string())),
    }
}
