//! SQL statement splitter.
//!
//! Splits a raw script into independently executable statements with a
//! single left-to-right scan. Semicolons only terminate a statement when the
//! scanner is in bare SQL; inside string literals, quoted identifiers,
//! dollar-quoted blocks and comments they are ordinary characters.
//!
//! All delimiters are ASCII, so the scanner walks bytes. UTF-8 continuation
//! bytes never collide with them and every slice boundary lands on a char
//! boundary.

use serde::Serialize;
use std::ops::Range;
use std::path::Path;

use crate::error::{OpenConstruct, Result, ScriptError};

/// Lexer state while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Bare,
    SingleQuote { backslash_escapes: bool },
    DoubleQuote,
    DollarQuote { tag_start: usize, tag_len: usize },
    LineComment,
    BlockComment,
}

/// Untrimmed slice of the script between two top-level terminators.
///
/// Concatenating the spans of all segments in order yields the whole script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Byte range in the script, including the trailing `;` if any.
    pub span: Range<usize>,
    /// Whether the segment holds anything besides whitespace and comments.
    pub has_code: bool,
}

/// One complete SQL command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Zero-based position in the script.
    pub index: usize,
    /// 1-based line the statement starts on.
    pub line: usize,
    /// Trimmed statement text, including its terminator when present.
    pub text: String,
    /// Byte range of `text` within the script.
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Statement {
    /// Short single-line rendering for progress lines and error messages.
    ///
    /// Runs of whitespace (newlines included) collapse to one space, and the
    /// result is cut to `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        collapse_whitespace(&self.text).chars().take(max_chars).collect()
    }

    /// Whether the statement ends with a top-level `;`.
    pub fn is_terminated(&self) -> bool {
        self.text.ends_with(';')
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read a script file in full.
///
/// A missing or unreadable file is a usage error, not an I/O failure of the
/// tool itself.
/// A leading byte order mark is dropped.
pub fn read_script(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ScriptError::Usage(format!("cannot read SQL file '{}': {}", path.display(), e))
    })?;
    match text.strip_prefix('\u{feff}') {
        Some(rest) => Ok(rest.to_string()),
        None => Ok(text),
    }
}

/// Split a script into trimmed, non-empty statements in source order.
///
/// Segments holding only whitespace or comments are dropped, so an empty
/// script, a comment-only script and `;;` all yield no statements.
pub fn parse_statements(script: &str) -> Result<Vec<Statement>> {
    let segments = split_segments(script)?;
    let mut statements = Vec::new();
    let mut line = 1;
    let mut line_counted_to = 0;

    for segment in segments.into_iter().filter(|s| s.has_code) {
        let raw = &script[segment.span.clone()];
        let leading = raw.len() - raw.trim_start().len();
        let text = raw.trim();
        let start = segment.span.start + leading;

        line += count_newlines(&script[line_counted_to..start]);
        line_counted_to = start;

        statements.push(Statement {
            index: statements.len(),
            line,
            text: text.to_string(),
            span: start..start + text.len(),
        });
    }

    Ok(statements)
}

/// Split a script into untrimmed segments at every top-level `;`.
///
/// This is the lossless view of the script: nothing is trimmed or dropped.
/// Ending inside a string, quoted identifier, dollar-quoted block or block
/// comment is reported as [`ScriptError::MalformedScript`]; ending inside a
/// line comment is fine.
pub fn split_segments(script: &str) -> Result<Vec<Segment>> {
    let bytes = script.as_bytes();
    let mut segments = Vec::new();
    let mut mode = Mode::Bare;
    let mut opened_at = 0;
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        match mode {
            Mode::Bare => match b {
                b'\'' => {
                    let escaped = is_escape_string_prefix(bytes, i);
                    mode = Mode::SingleQuote {
                        backslash_escapes: escaped,
                    };
                    opened_at = if escaped { i - 1 } else { i };
                    has_code = true;
                    i += 1;
                }
                b'"' => {
                    mode = Mode::DoubleQuote;
                    opened_at = i;
                    has_code = true;
                    i += 1;
                }
                b'-' if next == Some(b'-') => {
                    mode = Mode::LineComment;
                    i += 2;
                }
                b'/' if next == Some(b'*') => {
                    mode = Mode::BlockComment;
                    opened_at = i;
                    i += 2;
                }
                b'$' => {
                    has_code = true;
                    match dollar_tag_end(bytes, i) {
                        Some(end) => {
                            mode = Mode::DollarQuote {
                                tag_start: i + 1,
                                tag_len: end - i - 2,
                            };
                            opened_at = i;
                            i = end;
                        }
                        None => i += 1,
                    }
                }
                b';' => {
                    segments.push(Segment {
                        span: start..i + 1,
                        has_code,
                    });
                    i += 1;
                    start = i;
                    has_code = false;
                }
                _ if b.is_ascii() => {
                    if !b.is_ascii_whitespace() {
                        has_code = true;
                    }
                    i += 1;
                }
                _ => {
                    // Decode the whole character: NBSP and friends are blank too.
                    match script.get(i..).and_then(|rest| rest.chars().next()) {
                        Some(ch) => {
                            if !ch.is_whitespace() {
                                has_code = true;
                            }
                            i += ch.len_utf8();
                        }
                        None => {
                            has_code = true;
                            i += 1;
                        }
                    }
                }
            },

            Mode::SingleQuote { backslash_escapes } => {
                if backslash_escapes && b == b'\\' {
                    i += 2;
                } else if b == b'\'' {
                    if next == Some(b'\'') {
                        i += 2;
                    } else {
                        mode = Mode::Bare;
                        i += 1;
                    }
                } else {
                    i += 1;
                }
            }

            Mode::DoubleQuote => {
                if b == b'"' {
                    if next == Some(b'"') {
                        i += 2;
                    } else {
                        mode = Mode::Bare;
                        i += 1;
                    }
                } else {
                    i += 1;
                }
            }

            Mode::DollarQuote { tag_start, tag_len } => {
                let tag = &bytes[tag_start..tag_start + tag_len];
                if b == b'$' && closes_dollar_quote(bytes, i, tag) {
                    mode = Mode::Bare;
                    i += tag_len + 2;
                } else {
                    i += 1;
                }
            }

            Mode::LineComment => {
                if b == b'\n' {
                    mode = Mode::Bare;
                }
                i += 1;
            }

            Mode::BlockComment => {
                // First `*/` closes; comments do not nest.
                if b == b'*' && next == Some(b'/') {
                    mode = Mode::Bare;
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }
    }

    let open = match mode {
        Mode::Bare | Mode::LineComment => None,
        Mode::SingleQuote { .. } => Some(OpenConstruct::SingleQuote),
        Mode::DoubleQuote => Some(OpenConstruct::DoubleQuote),
        Mode::DollarQuote { tag_start, tag_len } => Some(OpenConstruct::DollarQuote {
            tag: script[tag_start..tag_start + tag_len].to_string(),
        }),
        Mode::BlockComment => Some(OpenConstruct::BlockComment),
    };
    if let Some(open) = open {
        let (line, column) = line_and_column(script, opened_at);
        return Err(ScriptError::MalformedScript {
            open,
            line,
            column,
            offset: opened_at,
        });
    }

    if start < bytes.len() {
        segments.push(Segment {
            span: start..bytes.len(),
            has_code,
        });
    }

    Ok(segments)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_tag_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_tag_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// `E'...'` / `e'...'` escape string: the prefix must not be the tail of an
/// identifier such as `type'`.
fn is_escape_string_prefix(bytes: &[u8], quote: usize) -> bool {
    quote >= 1
        && matches!(bytes[quote - 1], b'E' | b'e')
        && (quote < 2 || !is_ident_byte(bytes[quote - 2]))
}

/// If a dollar-quote opener `$tag$` starts at `pos`, return the index just
/// past its closing `$`.
///
/// `$1` is a positional parameter and `foo$bar$` is part of an identifier,
/// neither opens a dollar quote.
fn dollar_tag_end(bytes: &[u8], pos: usize) -> Option<usize> {
    if pos > 0 && is_ident_byte(bytes[pos - 1]) {
        return None;
    }
    let mut j = pos + 1;
    match bytes.get(j) {
        Some(b'$') => return Some(j + 1),
        Some(&b) if is_tag_start(b) => j += 1,
        _ => return None,
    }
    while let Some(&b) = bytes.get(j) {
        if b == b'$' {
            return Some(j + 1);
        }
        if !is_tag_byte(b) {
            return None;
        }
        j += 1;
    }
    None
}

fn closes_dollar_quote(bytes: &[u8], pos: usize, tag: &[u8]) -> bool {
    let rest = &bytes[pos + 1..];
    rest.len() > tag.len() && rest.starts_with(tag) && rest[tag.len()] == b'$'
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

fn line_and_column(script: &str, offset: usize) -> (usize, usize) {
    let before = &script[..offset];
    let line = count_newlines(before) + 1;
    let line_start = before.rfind('\n').map_or(0, |p| p + 1);
    let column = script[line_start..offset].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(script: &str) -> Vec<String> {
        parse_statements(script)
            .expect("script should split")
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    #[test]
    fn test_splits_on_top_level_semicolons() {
        let script = "CREATE TABLE a (id int);\nINSERT INTO a VALUES (1);\n\nSELECT * FROM a;\n";
        assert_eq!(
            texts(script),
            vec![
                "CREATE TABLE a (id int);",
                "INSERT INTO a VALUES (1);",
                "SELECT * FROM a;"
            ]
        );
    }

    #[test]
    fn test_segments_are_lossless() {
        let script = "  SELECT 'x;y';\n-- tail; comment\n/* a;b */ SELECT 2 ;\n\n";
        let segments = split_segments(script).unwrap();
        let rebuilt: String = segments.iter().map(|s| &script[s.span.clone()]).collect();
        assert_eq!(rebuilt, script);
    }

    #[test]
    fn test_semicolon_in_string_literal() {
        assert_eq!(
            texts("INSERT INTO t(v) VALUES ('a;b');"),
            vec!["INSERT INTO t(v) VALUES ('a;b');"]
        );
    }

    #[test]
    fn test_doubled_single_quote_stays_in_literal() {
        assert_eq!(
            texts("SELECT 'it''s; fine'; SELECT 2;"),
            vec!["SELECT 'it''s; fine';", "SELECT 2;"]
        );
    }

    #[test]
    fn test_escape_string_backslash_quote() {
        assert_eq!(
            texts(r"SELECT E'it\'s; ok'; SELECT 2;"),
            vec![r"SELECT E'it\'s; ok';", "SELECT 2;"]
        );
    }

    #[test]
    fn test_backslash_in_plain_string_is_literal() {
        assert_eq!(
            texts(r"SELECT 'C:\'; SELECT 2;"),
            vec![r"SELECT 'C:\';", "SELECT 2;"]
        );
    }

    #[test]
    fn test_identifier_ending_in_e_is_not_escape_prefix() {
        // `type'` is not an E'' string, so the backslash does not escape.
        assert_eq!(
            texts(r"SELECT some_type'\'; SELECT 2;"),
            vec![r"SELECT some_type'\';", "SELECT 2;"]
        );
    }

    #[test]
    fn test_semicolon_in_quoted_identifier() {
        assert_eq!(
            texts(r#"CREATE TABLE "odd;name" (""";col" int); SELECT 1;"#),
            vec![r#"CREATE TABLE "odd;name" (""";col" int);"#, "SELECT 1;"]
        );
    }

    #[test]
    fn test_dollar_quoted_function_body() {
        let script = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN x := 1; END; $$ LANGUAGE plpgsql;";
        assert_eq!(texts(script), vec![script]);
    }

    #[test]
    fn test_tagged_dollar_quote_ignores_other_tags() {
        let script = "DO $outer$ BEGIN PERFORM $$;$$; RAISE NOTICE 'x;'; END $outer$;\nSELECT 1;";
        assert_eq!(
            texts(script),
            vec![
                "DO $outer$ BEGIN PERFORM $$;$$; RAISE NOTICE 'x;'; END $outer$;",
                "SELECT 1;"
            ]
        );
    }

    #[test]
    fn test_positional_parameter_is_not_dollar_quote() {
        assert_eq!(
            texts("PREPARE q AS SELECT $1; EXECUTE q(1);"),
            vec!["PREPARE q AS SELECT $1;", "EXECUTE q(1);"]
        );
    }

    #[test]
    fn test_dollar_inside_identifier_is_not_dollar_quote() {
        assert_eq!(
            texts("SELECT a$b$ FROM t; SELECT 2;"),
            vec!["SELECT a$b$ FROM t;", "SELECT 2;"]
        );
    }

    #[test]
    fn test_line_comment_with_semicolon() {
        assert_eq!(
            texts("-- do this; not that\nSELECT 1;"),
            vec!["-- do this; not that\nSELECT 1;"]
        );
    }

    #[test]
    fn test_block_comment_with_semicolon() {
        assert_eq!(
            texts("SELECT /* a; b */ 1;\nSELECT 2;"),
            vec!["SELECT /* a; b */ 1;", "SELECT 2;"]
        );
    }

    #[test]
    fn test_block_comments_do_not_nest() {
        // The first `*/` closes, so the trailing `*/` is bare SQL.
        assert_eq!(
            texts("/* outer /* inner */ SELECT 1; */"),
            vec!["/* outer /* inner */ SELECT 1;", "*/"]
        );
    }

    #[test]
    fn test_missing_final_terminator() {
        let statements = parse_statements("SELECT 1;\nSELECT 2").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].text, "SELECT 2");
        assert!(statements[0].is_terminated());
        assert!(!statements[1].is_terminated());
    }

    #[test]
    fn test_empty_and_comment_only_scripts() {
        assert!(texts("").is_empty());
        assert!(texts("  \n\t\n").is_empty());
        assert!(texts("-- nothing here;\n/* or; here */\n").is_empty());
        assert!(texts(";;\n;").is_empty());
    }

    #[test]
    fn test_trailing_comment_after_last_statement_is_dropped() {
        assert_eq!(texts("SELECT 1;\n-- end of file"), vec!["SELECT 1;"]);
    }

    #[test]
    fn test_statement_lines_and_spans() {
        let script = "\n\nSELECT 1;\n  SELECT\n 2;";
        let statements = parse_statements(script).unwrap();
        assert_eq!(statements[0].line, 3);
        assert_eq!(statements[1].line, 4);
        assert_eq!(statements[1].index, 1);
        for s in &statements {
            assert_eq!(&script[s.span.clone()], s.text);
        }
    }

    #[test]
    fn test_unterminated_string_is_malformed() {
        let err = parse_statements("SELECT 1;\nSELECT 'oops;").unwrap_err();
        match err {
            ScriptError::MalformedScript {
                open,
                line,
                column,
                offset,
            } => {
                assert_eq!(open, OpenConstruct::SingleQuote);
                assert_eq!(line, 2);
                assert_eq!(column, 8);
                assert_eq!(offset, 17);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_constructs_are_malformed() {
        let cases = [
            ("SELECT \"col", OpenConstruct::DoubleQuote),
            (
                "DO $body$ BEGIN END;",
                OpenConstruct::DollarQuote {
                    tag: "body".to_string(),
                },
            ),
            ("SELECT 1; /* never closed", OpenConstruct::BlockComment),
        ];
        for (script, expected) in cases {
            match parse_statements(script) {
                Err(ScriptError::MalformedScript { open, .. }) => assert_eq!(open, expected),
                other => panic!("expected malformed script for {script:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_line_comment_at_end_of_input_is_fine() {
        assert_eq!(texts("SELECT 1 -- trailing"), vec!["SELECT 1 -- trailing"]);
    }

    #[test]
    fn test_multibyte_text_is_preserved() {
        let script = "INSERT INTO t VALUES ('héllo; wörld');\nSELECT '日本';";
        assert_eq!(
            texts(script),
            vec!["INSERT INTO t VALUES ('héllo; wörld');", "SELECT '日本';"]
        );
        let err = parse_statements("SELECT 'é', \"ü").unwrap_err();
        match err {
            ScriptError::MalformedScript { column, .. } => assert_eq!(column, 14),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unicode_whitespace_segments_are_dropped() {
        assert_eq!(texts("SELECT 1;\n\u{00A0}\n"), vec!["SELECT 1;"]);
        assert_eq!(
            texts("SELECT 1;\u{3000};SELECT 2;\u{0085}"),
            vec!["SELECT 1;", "SELECT 2;"]
        );
        assert_eq!(texts("\u{00A0};\u{2003}"), Vec::<String>::new());
    }

    #[test]
    fn test_read_script_drops_byte_order_mark() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all("\u{feff}SELECT 1;\nSELECT 2;".as_bytes())
            .unwrap();

        let script = read_script(file.path()).unwrap();
        let statements = parse_statements(&script).unwrap();
        assert!(statements[0].text.starts_with("SELECT"));
        assert_eq!(statements[0].span.start, 0);
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_missing_file_is_usage_error() {
        let err = read_script(Path::new("/nonexistent/0001_init.sql")).unwrap_err();
        assert!(matches!(err, ScriptError::Usage(_)));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let script = "CREATE TYPE mood AS ENUM ('ok', 'sad');\nALTER TABLE p ADD COLUMN m mood;";
        assert_eq!(parse_statements(script).unwrap(), parse_statements(script).unwrap());
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        let statements = parse_statements("SELECT\n    a,\n\tb\nFROM t;").unwrap();
        assert_eq!(statements[0].preview(120), "SELECT a, b FROM t;");
        assert_eq!(statements[0].preview(6), "SELECT");
    }
}
