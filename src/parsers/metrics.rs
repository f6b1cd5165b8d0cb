//! Structural feature extraction for a single function
//!
//! Every metric is computed without recursion: subtree counts use a
//! `TreeCursor` walk and nesting depth uses an explicit `(node, level)`
//! work stack, so adversarially deep input cannot exhaust the call stack.

use crate::models::{FunctionMetrics, FunctionRecord};
use tree_sitter::Node;

/// Extract the metric record for one `function_definition` node.
///
/// Returns `None` only when the node has no name, which cannot happen for a
/// tree that parsed without errors.
pub fn extract(func: Node<'_>, source: &[u8]) -> Option<FunctionRecord> {
    let name = func
        .child_by_field_name("name")?
        .utf8_text(source)
        .ok()?
        .to_string();
    if name.is_empty() {
        return None;
    }

    Some(FunctionRecord::new(name, function_metrics(func)))
}

/// Compute all structural metrics of a function node
pub fn function_metrics(func: Node<'_>) -> FunctionMetrics {
    let counts = ConstructCounts::of(func);
    FunctionMetrics {
        length: body_length(func),
        num_args: positional_arg_count(func),
        num_returns: counts.returns,
        num_if: counts.ifs,
        num_for: counts.fors,
        num_while: counts.whiles,
        max_depth: max_depth(func),
    }
}

/// Statements immediately inside the function body; nested statements are
/// not counted.
pub fn body_length(func: Node<'_>) -> u32 {
    func.child_by_field_name("body")
        .map(|body| statements(body).len() as u32)
        .unwrap_or(0)
}

/// Positional-or-keyword parameters.
///
/// Parameters before a `/` separator are positional-only and skipped, as
/// is everything from the first `*`, `*args` or `**kwargs` on.
pub fn positional_arg_count(func: Node<'_>) -> u32 {
    let Some(params) = func.child_by_field_name("parameters") else {
        return 0;
    };

    let mut cursor = params.walk();
    let children: Vec<Node<'_>> = params
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .collect();

    let start = children
        .iter()
        .rposition(|n| n.kind() == "positional_separator")
        .map_or(0, |i| i + 1);

    children[start..]
        .iter()
        .take_while(|n| !is_variadic_or_separator(n))
        .filter(|n| {
            matches!(
                n.kind(),
                "identifier" | "typed_parameter" | "default_parameter" | "typed_default_parameter"
            )
        })
        .count() as u32
}

/// `*`, `*args`, `**kwargs` (typed or not) end the positional section
fn is_variadic_or_separator(param: &Node<'_>) -> bool {
    match param.kind() {
        "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => true,
        "typed_parameter" => param.named_child(0).is_some_and(|inner| {
            matches!(
                inner.kind(),
                "list_splat_pattern" | "dictionary_splat_pattern"
            )
        }),
        _ => false,
    }
}

/// Counts of control-flow constructs over a whole subtree
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConstructCounts {
    pub returns: u32,
    pub ifs: u32,
    pub fors: u32,
    pub whiles: u32,
}

impl ConstructCounts {
    /// Count constructs in `node` and all of its descendants.
    ///
    /// `elif` branches count as `if` statements; `async for` is not a `for`.
    pub fn of(node: Node<'_>) -> Self {
        let mut counts = Self::default();
        for_each_node(node, |n| match n.kind() {
            "return_statement" => counts.returns += 1,
            "if_statement" | "elif_clause" => counts.ifs += 1,
            "for_statement" if !is_async(n) => counts.fors += 1,
            "while_statement" => counts.whiles += 1,
            _ => {}
        });
        counts
    }
}

/// Deepest statement-block nesting level inside a function.
///
/// Statements directly in the function body are at level 0; each statement
/// of a nested block sits one level below the statement that owns the
/// block. A body of plain statements therefore yields 0, and an `if`
/// inside a `for` inside a `while` yields 3.
pub fn max_depth(func: Node<'_>) -> u32 {
    let Some(body) = nested_block(func) else {
        return 0;
    };

    let mut deepest = 0;
    let mut stack: Vec<(Node<'_>, u32)> = statements(body).into_iter().map(|s| (s, 0)).collect();

    while let Some((node, level)) = stack.pop() {
        deepest = deepest.max(level);
        if let Some(block) = nested_block(node) {
            stack.extend(statements(block).into_iter().map(|s| (s, level + 1)));
        }
    }

    deepest
}

/// The primary statement block a compound statement owns.
///
/// Only the main body is followed; `else`, `elif`, `except` and `finally`
/// blocks do not add nesting.
fn nested_block(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "function_definition" | "class_definition" | "for_statement" | "while_statement"
        | "with_statement" | "try_statement" => node.child_by_field_name("body"),
        "if_statement" => node.child_by_field_name("consequence"),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .and_then(nested_block),
        _ => None,
    }
}

/// `async def`, `async for` and `async with` carry a leading `async` token
pub fn is_async(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == "async");
    found
}

/// Statements of a block, comments excluded
fn statements(block: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = block.walk();
    let stmts = block
        .named_children(&mut cursor)
        .filter(|n| !n.is_extra())
        .collect();
    stmts
}

/// Visit `root` and every descendant in pre-order
pub fn for_each_node<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
