//! Command line entry point.
//!
//! `sqlscript split|apply|check <FILE>` work on a single script;
//! `sqlscript serve` runs the MCP server on stdin/stdout.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sqlx::Connection;
use tracing_subscriber::EnvFilter;

use sqlscript_mcp::{
    check_statements, execute_statements, exit_codes, parse_statements, read_script, McpServer,
    McpSession, Result, ScriptError, Statement, PREVIEW_CHARS,
};

/// Split SQL scripts into statements and run them one at a time.
///
/// Semicolons inside string literals, quoted identifiers, dollar-quoted
/// blocks and comments never split a statement.
#[derive(Parser)]
#[command(name = "sqlscript")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXIT CODES:\n    \
    0  success\n    \
    1  a statement failed or the database was unreachable\n    \
    2  usage error, unreadable file or malformed script\n    \
    3  unexpected error")]
struct Args {
    /// Enable debug logging to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the statements of a script without running them
    Split {
        /// Path to the .sql file
        file: PathBuf,

        /// Print a JSON array of {index, line, text}
        #[arg(long)]
        json: bool,
    },

    /// Run every statement in order, stopping at the first failure
    Apply(RunArgs),

    /// Run every statement inside a transaction that is always rolled back
    Check(RunArgs),

    /// Serve the script tools over MCP (JSON-RPC 2.0 on stdin/stdout)
    Serve {
        /// Connection string of the target database
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,

        /// Reject sqlscript_apply; split and check stay available
        #[arg(long)]
        read_only: bool,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the .sql file
    file: PathBuf,

    /// Connection string of the target database
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

fn main() {
    let args = Args::parse();

    // stdout carries command output and the JSON-RPC stream, so logs go to stderr.
    let filter = if args.verbose {
        Some(EnvFilter::new("sqlscript_mcp=debug,sqlscript=debug"))
    } else {
        EnvFilter::try_from_default_env().ok()
    };
    if let Some(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(exit_codes::UNEXPECTED);
        }
    };

    let code = match runtime.block_on(run(args.command)) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            report_error(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Split { file, json } => split(&file, json),
        Command::Apply(args) => execute(args, false).await,
        Command::Check(args) => execute(args, true).await,
        Command::Serve {
            database_url,
            read_only,
        } => {
            let session = McpSession::new(database_url).with_read_only(read_only);
            let mut server = McpServer::new(session);
            tracing::info!(read_only, "serving MCP on stdio");
            server.run().await
        }
    }
}

fn split(file: &Path, json: bool) -> Result<()> {
    let script = read_script(file)?;
    let statements = parse_statements(&script)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statements)?);
        return Ok(());
    }

    for statement in &statements {
        println!(
            "-- statement {} (line {})\n{}\n",
            statement.index + 1,
            statement.line,
            statement.text
        );
    }
    eprintln!("{} statement(s)", statements.len());
    Ok(())
}

async fn execute(args: RunArgs, check: bool) -> Result<()> {
    let script = read_script(&args.file)?;
    let statements = parse_statements(&script)?;
    let session = McpSession::new(args.database_url);

    if statements.is_empty() {
        println!("No statements found in {}", args.file.display());
        return Ok(());
    }

    let mut conn = session.connect().await?;
    let total = statements.len();
    let mut progress = |index: usize, statement: &Statement| {
        println!(
            "Executing statement {}/{}: {}...",
            index + 1,
            total,
            statement.preview(PREVIEW_CHARS)
        );
    };

    let outcome = if check {
        check_statements(&mut conn, &statements, Some(&mut progress)).await
    } else {
        execute_statements(&mut conn, &statements, Some(&mut progress)).await
    };

    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close database connection");
    }

    let report = outcome?;
    if check {
        println!(
            "Check passed: all {} statements ran in {} ms; changes rolled back.",
            report.executed, report.elapsed_ms
        );
    } else {
        println!(
            "All {} statements executed successfully in {} ms.",
            report.executed, report.elapsed_ms
        );
    }
    Ok(())
}

fn report_error(err: &ScriptError) {
    match err {
        ScriptError::Execution {
            index,
            line,
            snippet,
            message,
        } => {
            eprintln!("Error: statement {} (line {}) failed: {}", index + 1, line, message);
            eprintln!("  {}", snippet);
        }
        other => eprintln!("Error: {}", other),
    }
}
