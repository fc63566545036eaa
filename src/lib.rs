//! # sqlscript-mcp
//!
//! Split SQL scripts into standalone statements and run them one at a time.
//!
//! Migration scripts routinely contain semicolons that do not end a
//! statement: inside string literals, quoted identifiers, dollar-quoted
//! function bodies and comments. This crate splits such scripts with a small
//! lexer and executes the resulting statements strictly in order, stopping at
//! the first one the database rejects so an operator can see exactly which
//! statement of a migration is broken.
//!
//! ## Features
//!
//! - **Statement splitter**: single pass, lossless, reports unterminated
//!   quotes and comments instead of guessing
//! - **Sequential executor**: one connection, one statement at a time, stop on
//!   first failure, optional progress hook
//! - **Check mode**: dry-run a script inside a transaction that is always
//!   rolled back
//! - **MCP server**: the same operations as tools over JSON-RPC 2.0 on stdio
//!
//! ## Usage
//!
//! ```text
//! sqlscript split migrations/0007_add_mood.sql
//! sqlscript check migrations/0007_add_mood.sql --database-url postgres://localhost/app
//! sqlscript serve --read-only
//! ```
//!
//! ## Library Usage
//!
//! ```
//! use sqlscript_mcp::parse_statements;
//!
//! let statements = parse_statements(
//!     "CREATE FUNCTION f() RETURNS void AS $$ BEGIN x := 1; END; $$ LANGUAGE plpgsql;\n\
//!      INSERT INTO t(v) VALUES ('a;b');",
//! )
//! .expect("well-formed script");
//! assert_eq!(statements.len(), 2);
//! ```

#![warn(missing_docs)]

mod convert;
mod error;
mod executor;
mod server;
mod session;
mod splitter;
mod tools;

pub use convert::{get_script_arg, report_to_json, statement_to_json, statements_to_json};
pub use error::{exit_codes, rpc_codes, OpenConstruct, Result, ScriptError};
pub use executor::{
    check_statements, execute_statements, ExecutionReport, Progress, SqlConnection, PREVIEW_CHARS,
};
pub use server::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use session::McpSession;
pub use splitter::{parse_statements, read_script, split_segments, Segment, Statement};
pub use tools::{ToolDef, ToolRegistry};
