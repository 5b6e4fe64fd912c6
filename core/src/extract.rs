//! Comment extraction over tree-sitter parse trees.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Grammar hint controlling how a source file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Plain script syntax (JavaScript, including JSX expressions).
    Script,
    /// TypeScript/JSX syntax parsed with the TSX grammar.
    Jsx,
}

impl Dialect {
    /// Pick a dialect from the file extension, defaulting to plain script.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ts") | Some("tsx") | Some("jsx") => Dialect::Jsx,
            _ => Dialect::Script,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Script => f.write_str("script"),
            Dialect::Jsx => f.write_str("jsx"),
        }
    }
}

/// Location metadata in 1-based line/column coordinates.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A single comment lifted out of a source file, delimiters stripped.
///
/// The body is kept verbatim: leading `*` or `!` decoration and interior
/// whitespace survive so diagnostics can quote the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub location: Location,
    pub span: (usize, usize),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("source is not valid {0} syntax")]
    Parse(Dialect),
    #[error("the {0} grammar could not be loaded")]
    Grammar(Dialect),
}

/// Extract every comment from `source` in lexical order.
///
/// Fails for the whole file when the source does not parse in the chosen
/// dialect; there is no partial extraction.
pub fn extract_comments(source: &str, dialect: Dialect) -> Result<Vec<Comment>, ExtractError> {
    let mut parser = tree_sitter::Parser::new();
    let language: tree_sitter::Language = match dialect {
        Dialect::Script => tree_sitter_javascript::LANGUAGE.into(),
        Dialect::Jsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    };
    parser
        .set_language(&language)
        .map_err(|_| ExtractError::Grammar(dialect))?;

    let tree = parser
        .parse(source, None)
        .ok_or(ExtractError::Parse(dialect))?;
    if tree.root_node().has_error() {
        return Err(ExtractError::Parse(dialect));
    }

    let mut comments = Vec::new();
    collect_comments(tree.root_node(), source, &mut comments);
    Ok(comments)
}

fn collect_comments(node: tree_sitter::Node, source: &str, out: &mut Vec<Comment>) {
    if node.kind() == "comment" || node.kind() == "html_comment" {
        let raw = node.utf8_text(source.as_bytes()).unwrap_or("");
        let start = node.start_position();
        out.push(Comment {
            text: strip_delimiters(raw).to_string(),
            location: Location {
                line: start.row + 1,
                column: start.column + 1,
            },
            span: (node.start_byte(), node.end_byte()),
        });
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_comments(child, source, out);
        }
    }
}

fn strip_delimiters(raw: &str) -> &str {
    if let Some(rest) = raw.strip_prefix("//") {
        rest
    } else if let Some(rest) = raw.strip_prefix("/*") {
        rest.strip_suffix("*/").unwrap_or(rest)
    } else {
        raw
    }
}
