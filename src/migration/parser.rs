//! Migration file parser
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE users (id INT);
//!
//! -- +migrate StatementBegin
//! CREATE FUNCTION touch() RETURNS trigger AS $$
//! BEGIN
//!     NEW.updated_at = now();
//!     RETURN NEW;
//! END;
//! $$ LANGUAGE plpgsql;
//! -- +migrate StatementEnd
//!
//! -- +migrate Down
//! DROP FUNCTION touch();
//! DROP TABLE users;
//! ```
//!
//! A statement ends at a line whose last word before any word starting with
//! `--` ends in `;`. String literals are not tokenized: `'a--b');` still ends
//! a statement, while a `;` followed by more text inside a literal does not.
//! Such statements must be wrapped in `StatementBegin`/`StatementEnd`.
//!
//! Everything before the Up marker is ignored, directives included, except a
//! Down marker, which is an error there.

use super::error::MigrationError;
use super::migration::Migration;

const DIRECTIVE_PREFIX: &str = "-- +migrate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

struct Parser<'a> {
    id: &'a str,
    section: Section,
    up: Vec<String>,
    down: Vec<String>,
    buffer: String,
    /// Line number of the open `StatementBegin`, if any
    block_start: Option<usize>,
    buffer_start: usize,
}

impl<'a> Parser<'a> {
    fn new(id: &'a str) -> Self {
        Self {
            id,
            section: Section::Preamble,
            up: Vec::new(),
            down: Vec::new(),
            buffer: String::new(),
            block_start: None,
            buffer_start: 0,
        }
    }

    fn error(&self, line: usize, message: impl std::fmt::Display) -> MigrationError {
        MigrationError::Parse {
            id: self.id.to_string(),
            message: format!("line {line}: {message}"),
        }
    }

    fn push_statement(&mut self) {
        let statement = self.buffer.trim().to_string();
        self.buffer.clear();
        if statement.is_empty() {
            return;
        }
        match self.section {
            Section::Up => self.up.push(statement),
            Section::Down => self.down.push(statement),
            Section::Preamble => {}
        }
    }

    /// Fail if a statement is still open when a new section or block starts
    fn ensure_no_open_statement(&self, line: usize) -> Result<(), MigrationError> {
        if let Some(start) = self.block_start {
            return Err(self.error(
                line,
                format!("StatementBegin on line {start} is not closed by StatementEnd"),
            ));
        }
        if !self.buffer.trim().is_empty() {
            return Err(self.error(
                self.buffer_start,
                "statement is not terminated with ';' (possibly missing a semicolon?)",
            ));
        }
        Ok(())
    }

    fn directive(&mut self, line: usize, rest: &str) -> Result<(), MigrationError> {
        let mut words = rest.split_whitespace();
        let command = words.next().unwrap_or("");
        if self.section == Section::Preamble && !matches!(command, "Up" | "Down") {
            return Ok(());
        }
        if let Some(extra) = words.next() {
            return Err(self.error(
                line,
                format!("unexpected option '{extra}' after '{DIRECTIVE_PREFIX} {command}'"),
            ));
        }

        match command {
            "Up" => {
                if self.section != Section::Preamble {
                    return Err(self.error(line, "duplicate '-- +migrate Up' marker"));
                }
                self.buffer.clear();
                self.section = Section::Up;
            }
            "Down" => {
                match self.section {
                    Section::Preamble => {
                        return Err(self.error(
                            line,
                            "'-- +migrate Down' marker appears before '-- +migrate Up'",
                        ))
                    }
                    Section::Down => {
                        return Err(self.error(line, "duplicate '-- +migrate Down' marker"))
                    }
                    Section::Up => {}
                }
                self.ensure_no_open_statement(line)?;
                self.section = Section::Down;
            }
            "StatementBegin" => {
                self.ensure_no_open_statement(line)?;
                self.block_start = Some(line);
                self.buffer_start = line + 1;
            }
            "StatementEnd" => {
                if self.block_start.take().is_none() {
                    return Err(self.error(line, "StatementEnd without StatementBegin"));
                }
                self.push_statement();
            }
            "" => return Err(self.error(line, "missing directive after '-- +migrate'")),
            other => return Err(self.error(line, format!("unknown directive '{other}'"))),
        }
        Ok(())
    }

    fn line(&mut self, number: usize, line: &str) {
        if self.section == Section::Preamble {
            return;
        }

        let in_block = self.block_start.is_some();
        let trimmed = line.trim();
        let between_statements = !in_block && self.buffer.trim().is_empty();
        if between_statements && (trimmed.is_empty() || trimmed.starts_with("--")) {
            return;
        }

        if self.buffer.is_empty() {
            self.buffer_start = number;
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');

        if !in_block && ends_with_semicolon(line) {
            self.push_statement();
        }
    }

    fn finish(mut self, last_line: usize) -> Result<Migration, MigrationError> {
        if self.section == Section::Preamble {
            return Err(MigrationError::Parse {
                id: self.id.to_string(),
                message: "no '-- +migrate Up' marker found".to_string(),
            });
        }
        self.ensure_no_open_statement(last_line)?;
        self.push_statement();
        Ok(Migration::new(self.id, self.up, self.down))
    }
}

/// True when the last word before a `--` comment word ends with `;`
fn ends_with_semicolon(line: &str) -> bool {
    line.split_whitespace()
        .take_while(|word| !word.starts_with("--"))
        .last()
        .is_some_and(|word| word.ends_with(';'))
}

/// Extract the directive text if `line` is a `-- +migrate ...` marker
fn directive_text(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(DIRECTIVE_PREFIX)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Parse the content of one migration file
///
/// # Errors
///
/// Returns `MigrationError::Parse` if the file has no Up marker, repeats a
/// marker, has Down before Up, contains an unknown directive, leaves a
/// `StatementBegin` open, or ends with an unterminated statement.
pub fn parse_migration(id: &str, content: &str) -> Result<Migration, MigrationError> {
    let mut parser = Parser::new(id);
    let mut last_line = 0;

    for (idx, line) in content.lines().enumerate() {
        let number = idx + 1;
        last_line = number;
        match directive_text(line) {
            Some(rest) => parser.directive(number, rest)?,
            None => parser.line(number, line),
        }
    }

    parser.finish(last_line)
}
