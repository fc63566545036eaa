//! MCP session state.
//!
//! Holds the connection configuration the tools run against. Every run opens
//! its own connection and closes it on return; nothing is pooled between
//! calls.

use sqlx::{Connection, PgConnection};
use tracing::debug;

use crate::error::{Result, ScriptError};

/// MCP session state.
#[derive(Debug, Clone, Default)]
pub struct McpSession {
    /// Connection string for the target database
    database_url: Option<String>,
    /// Whether tools that apply changes are rejected
    read_only: bool,
}

impl McpSession {
    /// Create a session targeting `database_url`, if any.
    pub fn new(database_url: Option<String>) -> Self {
        Self {
            database_url,
            read_only: false,
        }
    }

    /// Reject tools that would leave changes behind.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Whether the session rejects apply tools.
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Whether a database URL is configured.
    pub fn has_database(&self) -> bool {
        self.database_url.is_some()
    }

    /// Fail with [`ScriptError::ReadOnly`] if the session is read-only.
    pub fn ensure_writable(&self, tool: &str) -> Result<()> {
        if self.read_only {
            return Err(ScriptError::ReadOnly(tool.to_string()));
        }
        Ok(())
    }

    /// Open a fresh connection to the configured database.
    ///
    /// The connection belongs to the caller and is closed when dropped.
    pub async fn connect(&self) -> Result<PgConnection> {
        let url = self.database_url.as_deref().ok_or_else(|| {
            ScriptError::Usage(
                "no database configured; pass --database-url or set DATABASE_URL".to_string(),
            )
        })?;
        debug!("opening database connection");
        PgConnection::connect(url)
            .await
            .map_err(|e| ScriptError::Connection(e.to_string()))
    }
}
