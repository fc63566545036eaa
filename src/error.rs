//! Error types for script splitting, execution and the MCP server.
//!
//! Every failure carries enough context (statement index, line, snippet) to
//! pinpoint the offending statement. Errors are returned to the caller; only
//! the binary turns them into process exit codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lexer mode in which a script ended unexpectedly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpenConstruct {
    /// `'...` never closed.
    SingleQuote,
    /// `"...` never closed.
    DoubleQuote,
    /// `$tag$...` never closed by the matching `$tag$`.
    DollarQuote {
        /// The tag between the dollar signs (empty for `$$`).
        tag: String,
    },
    /// `/* ...` never closed.
    BlockComment,
}

impl fmt::Display for OpenConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenConstruct::SingleQuote => write!(f, "string literal"),
            OpenConstruct::DoubleQuote => write!(f, "quoted identifier"),
            OpenConstruct::DollarQuote { tag } => write!(f, "dollar-quoted block ${}$", tag),
            OpenConstruct::BlockComment => write!(f, "block comment"),
        }
    }
}

/// Errors raised while splitting or running a SQL script.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ScriptError {
    /// Missing input, unreadable file or missing database URL.
    #[error("usage error: {0}")]
    Usage(String),

    /// The script ended inside a quote, comment or dollar-quoted block.
    #[error("malformed script: unterminated {open} starting at line {line}, column {column}")]
    MalformedScript {
        /// The construct left open at end of input
        open: OpenConstruct,
        /// 1-based line where the construct started
        line: usize,
        /// 1-based column (in characters) where the construct started
        column: usize,
        /// Byte offset where the construct started
        offset: usize,
    },

    /// The database rejected a statement.
    #[error("statement {} (line {line}) failed: {message}", .index + 1)]
    Execution {
        /// Zero-based index of the failing statement
        index: usize,
        /// 1-based line the statement starts on
        line: usize,
        /// Collapsed preview of the statement text
        snippet: String,
        /// Message reported by the database
        message: String,
    },

    /// The database connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// Unknown tool requested.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArg(String),

    /// Invalid argument value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// A write tool was called on a read-only session.
    #[error("session is read-only: {0} is not allowed")]
    ReadOnly(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ScriptError {
    fn from(err: std::io::Error) -> Self {
        ScriptError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ScriptError {
    fn from(err: serde_json::Error) -> Self {
        ScriptError::Protocol(format!("JSON error: {}", err))
    }
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error - a statement was rejected by the database.
    pub const EXECUTION_ERROR: i32 = -32001;
    /// Server error - the database could not be reached.
    pub const CONNECTION_ERROR: i32 = -32002;
}

/// Process exit codes for the three failure classes of the CLI.
pub mod exit_codes {
    /// Everything ran.
    pub const SUCCESS: i32 = 0;
    /// A statement failed or the database was unreachable.
    pub const EXECUTION: i32 = 1;
    /// Bad invocation, unreadable input or malformed script.
    pub const USAGE: i32 = 2;
    /// Anything else.
    pub const UNEXPECTED: i32 = 3;
}

impl ScriptError {
    /// Convert to JSON-RPC error code.
    pub fn rpc_code(&self) -> i32 {
        match self {
            ScriptError::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            ScriptError::MissingArg(_)
            | ScriptError::InvalidArg { .. }
            | ScriptError::Usage(_)
            | ScriptError::MalformedScript { .. }
            | ScriptError::ReadOnly(_) => rpc_codes::INVALID_PARAMS,
            ScriptError::Protocol(_) => rpc_codes::INVALID_REQUEST,
            ScriptError::Execution { .. } => rpc_codes::EXECUTION_ERROR,
            ScriptError::Connection(_) => rpc_codes::CONNECTION_ERROR,
            ScriptError::Io(_) | ScriptError::Internal(_) => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Convert to a CLI process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptError::Usage(_)
            | ScriptError::MalformedScript { .. }
            | ScriptError::MissingArg(_)
            | ScriptError::InvalidArg { .. } => exit_codes::USAGE,
            ScriptError::Execution { .. } | ScriptError::Connection(_) => exit_codes::EXECUTION,
            _ => exit_codes::UNEXPECTED,
        }
    }
}

/// Result type for script operations.
pub type Result<T> = std::result::Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let usage = ScriptError::Usage("no file".to_string());
        let malformed = ScriptError::MalformedScript {
            open: OpenConstruct::SingleQuote,
            line: 1,
            column: 1,
            offset: 0,
        };
        let execution = ScriptError::Execution {
            index: 0,
            line: 1,
            snippet: "SELECT".to_string(),
            message: "syntax error".to_string(),
        };
        let unexpected = ScriptError::Internal("boom".to_string());

        assert_eq!(usage.exit_code(), exit_codes::USAGE);
        assert_eq!(malformed.exit_code(), exit_codes::USAGE);
        assert_eq!(execution.exit_code(), exit_codes::EXECUTION);
        assert_eq!(unexpected.exit_code(), exit_codes::UNEXPECTED);
    }

    #[test]
    fn test_execution_message_is_one_based() {
        let err = ScriptError::Execution {
            index: 1,
            line: 4,
            snippet: "ALTER TABLE t ADD COLUMN c mood".to_string(),
            message: "type \"mood\" does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "statement 2 (line 4) failed: type \"mood\" does not exist"
        );
    }

    #[test]
    fn test_malformed_message_names_construct() {
        let err = ScriptError::MalformedScript {
            open: OpenConstruct::DollarQuote {
                tag: "body".to_string(),
            },
            line: 3,
            column: 7,
            offset: 40,
        };
        assert!(err.to_string().contains("dollar-quoted block $body$"));
        assert!(err.to_string().contains("line 3, column 7"));
    }

    #[test]
    fn test_rpc_codes() {
        assert_eq!(
            ScriptError::UnknownTool("x".to_string()).rpc_code(),
            rpc_codes::METHOD_NOT_FOUND
        );
        assert_eq!(
            ScriptError::MissingArg("sql".to_string()).rpc_code(),
            rpc_codes::INVALID_PARAMS
        );
        assert_eq!(
            ScriptError::Connection("refused".to_string()).rpc_code(),
            rpc_codes::CONNECTION_ERROR
        );
    }
}
