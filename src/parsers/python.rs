//! Python parser using tree-sitter
//!
//! Parses module source, rejects anything with syntax errors, and hands each
//! top-level function definition to the metrics extractor.

use super::metrics::{self, for_each_node, is_async};
use crate::error::{Error, Result};
use crate::models::FunctionRecord;
use tree_sitter::{Node, Parser, Point, Tree};

/// Parse Python source into a syntax tree.
///
/// tree-sitter recovers from errors by inserting `ERROR` and missing nodes;
/// any such node is reported as a parse error at its position. The grammar
/// also accepts a few Python 2 forms and re-parents misindented statements
/// without an error node, so those are rejected separately.
pub fn parse(source: &str, file: Option<&str>) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| parse_error(file, 0, 0, format!("failed to load Python grammar: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| parse_error(file, 0, 0, "parser produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, column, message) = match first_syntax_error(root) {
            Some(node) => {
                let pos = node.start_position();
                let message = if node.is_missing() {
                    format!("missing \"{}\"", node.kind())
                } else {
                    let snippet = node
                        .utf8_text(source.as_bytes())
                        .ok()
                        .and_then(|t| t.lines().next())
                        .map(|t| t.chars().take(40).collect::<String>())
                        .unwrap_or_default();
                    if snippet.trim().is_empty() {
                        "invalid syntax".to_string()
                    } else {
                        format!("invalid syntax near `{}`", snippet.trim())
                    }
                };
                (pos.row + 1, pos.column + 1, message)
            }
            None => (1, 1, "invalid syntax".to_string()),
        };
        return Err(parse_error(file, line, column, message));
    }

    if let Some((pos, message)) = first_python3_violation(root, source) {
        return Err(parse_error(file, pos.row + 1, pos.column + 1, message));
    }

    Ok(tree)
}

/// Parse source and extract a record for each top-level function, in
/// declaration order.
///
/// Decorated definitions count as functions; `async def` does not. Methods
/// and nested functions are not top-level and are only visible through
/// their enclosing definition's metrics.
pub fn extract_functions(source: &str, file: Option<&str>) -> Result<Vec<FunctionRecord>> {
    let tree = parse(source, file)?;
    let bytes = source.as_bytes();

    let records = top_level_functions(tree.root_node())
        .into_iter()
        .filter_map(|func| metrics::extract(func, bytes))
        .map(|record| match file {
            Some(file) => record.with_file(file),
            None => record,
        })
        .collect();

    Ok(records)
}

/// Plain `def` nodes directly under the module, in source order
pub fn top_level_functions(root: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = root.walk();
    let functions = root
        .named_children(&mut cursor)
        .filter_map(|node| match node.kind() {
            "function_definition" => Some(node),
            "decorated_definition" => node.child_by_field_name("definition"),
            _ => None,
        })
        .filter(|def| def.kind() == "function_definition" && !is_async(*def))
        .collect();
    functions
}

/// Earliest construct tree-sitter accepts without an error node but Python 3
/// rejects
fn first_python3_violation(root: Node<'_>, source: &str) -> Option<(Point, String)> {
    let mut violations: Vec<(Point, String)> = Vec::new();

    for_each_node(root, |node| match node.kind() {
        "print_statement" => violations.push((
            node.start_position(),
            "Missing parentheses in call to 'print'".to_string(),
        )),
        "exec_statement" => violations.push((
            node.start_position(),
            "Missing parentheses in call to 'exec'".to_string(),
        )),
        "<>" if !node.is_named() => {
            violations.push((node.start_position(), "invalid operator `<>`".to_string()))
        }
        "module" | "block" => {
            if let Some(stmt) = misaligned_statement(node, source) {
                violations.push((stmt.start_position(), "inconsistent indentation".to_string()));
            }
        }
        _ => {}
    });

    violations.extend(stray_backticks(root, source));
    violations
        .into_iter()
        .min_by_key(|(pos, _)| (pos.row, pos.column))
}

/// First statement of `block` that begins a line at a different indentation
/// than the block's first statement
fn misaligned_statement<'t>(block: Node<'t>, source: &str) -> Option<Node<'t>> {
    let mut cursor = block.walk();
    let stmts: Vec<Node<'t>> = block
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .collect();

    let (first, rest) = stmts.split_first()?;
    let expected = indentation(*first, source).map_or(first.start_position().column, str::len);
    rest.iter()
        .copied()
        .find(|stmt| indentation(*stmt, source).is_some_and(|indent| indent.len() != expected))
}

/// Leading whitespace of the statement's line, or `None` when the statement
/// does not begin its line (`a = 1; b = 2`, `if x: pass`)
fn indentation<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    let start = node.start_byte();
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let prefix = source[line_start..start].trim_start_matches('\u{feff}');
    prefix.chars().all(char::is_whitespace).then_some(prefix)
}

/// Backticks outside strings and comments (Python 2 repr syntax)
fn stray_backticks(root: Node<'_>, source: &str) -> Vec<(Point, String)> {
    source
        .match_indices('`')
        .map(|(offset, _)| offset)
        .filter(|&offset| {
            let mut node = root.descendant_for_byte_range(offset, offset + 1);
            while let Some(current) = node {
                if matches!(current.kind(), "string" | "string_content" | "comment") {
                    return false;
                }
                node = current.parent();
            }
            true
        })
        .map(|offset| {
            let before = &source[..offset];
            let line_start = before.rfind('\n').map_or(0, |i| i + 1);
            let pos = Point {
                row: before.matches('\n').count(),
                column: offset - line_start,
            };
            (pos, "invalid syntax: backtick outside a string".to_string())
        })
        .collect()
}

/// First `ERROR` or missing node in source order
fn first_syntax_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

fn parse_error(file: Option<&str>, line: usize, column: usize, message: String) -> Error {
    Error::Parse {
        file: file.map(str::to_string),
        line,
        column,
        message,
    }
}
