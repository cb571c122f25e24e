use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Maximum number of dot-separated segments: catalog, database, object
const MAX_SEGMENTS: usize = 3;

/// Keywords that must be escaped with backticks to be used as identifiers
const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "AND", "ANY", "ARRAY", "AS", "ASC", "BETWEEN", "BIGINT", "BINARY", "BOOLEAN",
    "BOTH", "BY", "CASE", "CAST", "CHAR", "CHECK", "COLUMN", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "DATABASE", "DATE", "DECIMAL", "DEFAULT", "DELETE", "DESC", "DESCRIBE", "DISTINCT",
    "DOUBLE", "DROP", "ELSE", "END", "ESCAPE", "EXCEPT", "EXISTS", "EXPLAIN", "FALSE", "FETCH",
    "FLOAT", "FOR", "FROM", "FULL", "FUNCTION", "GROUP", "HAVING", "IN", "INNER", "INSERT", "INT",
    "INTEGER", "INTERSECT", "INTERVAL", "INTO", "IS", "JOIN", "LATERAL", "LEADING", "LEFT",
    "LIKE", "LIMIT", "MAP", "MATCH", "MERGE", "MINUS", "MULTISET", "NATURAL", "NOT", "NULL",
    "OF", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "PRIMARY", "RANGE",
    "REFERENCES", "RIGHT", "ROW", "ROWS", "SELECT", "SET", "SHOW", "SMALLINT", "SOME", "TABLE",
    "THEN", "TIME", "TIMESTAMP", "TINYINT", "TO", "TRAILING", "TRUE", "UNION", "UNIQUE",
    "UNKNOWN", "UPDATE", "USE", "USER", "USING", "VALUES", "VARCHAR", "VIEW", "WHEN", "WHERE",
    "WINDOW", "WITH",
];

/// Whether `word` is a reserved keyword, ignoring case
pub fn is_reserved(word: &str) -> bool {
    RESERVED_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Whether `name` can be written without backticks
fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_identifier_char) && !is_reserved(name)
}

/// Render an identifier, escaping it with backticks only when needed
pub fn escape_identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// A path as written, before the session's current catalog and database
/// fill in the missing parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub catalog: Option<String>,
    pub database: Option<String>,
    pub object: String,
}

impl ParsedPath {
    /// Parse one to three dot-separated, optionally backtick-escaped segments
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::parse(input, "path is empty"));
        }

        let mut parser = SegmentParser {
            input,
            chars: trimmed.char_indices().peekable(),
        };
        let mut segments = Vec::with_capacity(MAX_SEGMENTS);

        loop {
            segments.push(parser.segment()?);
            if segments.len() > MAX_SEGMENTS {
                return Err(BridgeError::parse(
                    input,
                    format!("expected at most {} segments", MAX_SEGMENTS),
                ));
            }
            match parser.chars.next() {
                None => break,
                Some((_, '.')) => continue,
                Some((_, c)) => {
                    return Err(BridgeError::parse(
                        input,
                        format!("unexpected character '{}'", c),
                    ));
                }
            }
        }

        let object = segments.pop().unwrap_or_default();
        let database = segments.pop();
        let catalog = segments.pop();

        Ok(Self {
            catalog,
            database,
            object,
        })
    }

    /// Fill in missing segments from the current catalog and database
    pub fn resolve(self, current_catalog: &str, current_database: &str) -> QualifiedPath {
        QualifiedPath {
            catalog: self.catalog.unwrap_or_else(|| current_catalog.to_string()),
            database: self.database.unwrap_or_else(|| current_database.to_string()),
            object: self.object,
        }
    }
}

struct SegmentParser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl SegmentParser<'_> {
    /// Read one segment, stopping in front of the next '.' or at the end
    fn segment(&mut self) -> Result<String> {
        let segment = match self.chars.peek() {
            Some((_, '`')) => {
                self.chars.next();
                let segment = self.escaped()?;
                if let Some((_, c)) = self.chars.peek()
                    && *c != '.'
                {
                    return Err(BridgeError::parse(
                        self.input,
                        format!("unexpected character '{}' after closing backtick", c),
                    ));
                }
                segment
            }
            _ => self.plain()?,
        };

        if segment.is_empty() {
            return Err(BridgeError::parse(self.input, "empty path segment"));
        }
        Ok(segment)
    }

    /// Body of a backtick-escaped segment; the opening backtick is consumed
    fn escaped(&mut self) -> Result<String> {
        let mut segment = String::new();
        loop {
            match self.chars.next() {
                None => return Err(BridgeError::parse(self.input, "unterminated backtick")),
                Some((_, '`')) => {
                    if let Some((_, '`')) = self.chars.peek() {
                        self.chars.next();
                        segment.push('`');
                    } else {
                        return Ok(segment);
                    }
                }
                Some((_, c)) => segment.push(c),
            }
        }
    }

    fn plain(&mut self) -> Result<String> {
        let mut segment = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if *c == '.' {
                break;
            }
            if !is_identifier_char(*c) {
                return Err(BridgeError::parse(
                    self.input,
                    format!("invalid character '{}' in unescaped identifier", c),
                ));
            }
            segment.push(*c);
            self.chars.next();
        }

        if is_reserved(&segment) {
            return Err(BridgeError::parse(
                self.input,
                format!(
                    "'{}' is a reserved keyword and must be escaped with backticks",
                    segment
                ),
            ));
        }
        Ok(segment)
    }
}

/// A fully qualified catalog object path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedPath {
    pub catalog: String,
    pub database: String,
    pub object: String,
}

impl QualifiedPath {
    pub fn new(
        catalog: impl Into<String>,
        database: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for QualifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            escape_identifier(&self.catalog),
            escape_identifier(&self.database),
            escape_identifier(&self.object)
        )
    }
}

/// Parse `path` and resolve it against the current catalog and database
pub fn resolve(path: &str, current_catalog: &str, current_database: &str) -> Result<QualifiedPath> {
    Ok(ParsedPath::parse(path)?.resolve(current_catalog, current_database))
}
