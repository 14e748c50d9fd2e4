//! Lexical layer for the rules language.
//!
//! Rules documents are split into lines and comma separated fields here.
//! The only structured token inside a line is the rows type definition,
//! which is tokenized with a small chumsky grammar:
//!
//! ```text
//! rows_def := item ('&' item)*
//! item     := KEYWORD (':' suffix (';' suffix)*)?
//! ```

use std::sync::LazyLock;

use chumsky::prelude::*;
use regex::Regex;

/// Joins several rows types of one table.
pub const COMBINATOR: char = '&';
/// Separates a rows type keyword from its suffix list.
pub const SUFFIX_START: char = ':';
/// Separates suffixes.
pub const SUFFIX_SEPARATOR: char = ';';

static NAME_INVALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());
static ROWS_DEF_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_&:;]").unwrap());
static TYPE_INVALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_()\-]").unwrap());
static SIZED_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_\-]+)\((\d+)\)$").unwrap());

// ============================================================================
// Lines and fields
// ============================================================================

/// Iterate over the meaningful lines of a rules document.
///
/// Yields `(line_number, line)` with 1-based line numbers. Blank lines and
/// lines starting with `#` (after leading whitespace) are skipped. Both
/// `\n` and `\r\n` line endings are accepted.
pub fn rule_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
}

/// Split a rule line on commas into trimmed fields.
pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Keep only letters, digits and underscores.
pub fn sanitize_name(token: &str) -> String {
    NAME_INVALID.replace_all(token, "").into_owned()
}

/// Like [`sanitize_name`], also keeping the combinator and suffix separators.
pub fn sanitize_rows_def(token: &str) -> String {
    ROWS_DEF_INVALID.replace_all(token, "").into_owned()
}

/// Like [`sanitize_name`], also keeping parentheses and hyphens for sized
/// and hyphenated types such as `varchar(255)` and `auto-increment`.
pub fn sanitize_type(token: &str) -> String {
    TYPE_INVALID.replace_all(token, "").into_owned()
}

/// Split a type token into its base name and optional size.
///
/// `varchar(255)` → `("varchar", Some(255))`, `int` → `("int", None)`.
/// Returns `None` when the token has parentheses but is not of the form
/// `name(digits)`, or the size does not fit in a `u32`.
pub fn split_sized_type(token: &str) -> Option<(String, Option<u32>)> {
    if !token.contains('(') && !token.contains(')') {
        return Some((token.to_string(), None));
    }
    let caps = SIZED_TYPE.captures(token)?;
    let size = caps[2].parse::<u32>().ok()?;
    Some((caps[1].to_string(), Some(size)))
}

// ============================================================================
// Rows type definitions
// ============================================================================

/// One `KEYWORD[:suffixes]` item of a rows type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowsItem<'src> {
    pub keyword: &'src str,
    pub suffixes: Vec<&'src str>,
}

/// Create a parser for a sanitized rows type definition.
pub fn rows_def_parser<'src>(
) -> impl Parser<'src, &'src str, Vec<RowsItem<'src>>, extra::Err<Rich<'src, char>>> {
    let word = any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .to_slice();

    let suffixes = just(SUFFIX_START).ignore_then(
        word.clone()
            .separated_by(just(SUFFIX_SEPARATOR))
            .allow_trailing()
            .at_least(1)
            .collect::<Vec<_>>(),
    );

    let item = word
        .then(suffixes.or_not())
        .map(|(keyword, suffixes)| RowsItem {
            keyword,
            suffixes: suffixes.unwrap_or_default(),
        });

    item.separated_by(just(COMBINATOR))
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Tokenize a rows type definition.
///
/// Returns the items on success, or human readable error messages.
pub fn lex_rows_def(source: &str) -> Result<Vec<RowsItem<'_>>, Vec<String>> {
    let (items, errs) = rows_def_parser().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(items.unwrap_or_default())
    } else {
        Err(errs
            .into_iter()
            .map(|e| {
                let span = e.span();
                format!(
                    "Invalid rows type definition '{}' at position {}: {}",
                    source, span.start, e
                )
            })
            .collect())
    }
}
