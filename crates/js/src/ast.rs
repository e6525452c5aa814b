//! Typed JavaScript syntax tree lowered from tree-sitter, plus the structural
//! queries the indexer runs over it.

use crate::error::QueryError;
use tree_sitter::Node as TsNode;

/// Lowered nodes nested deeper than this become childless `Other` leaves.
/// Counts [`Node`] levels, so every recursive pass over a lowered tree is
/// bounded by it.
pub const MAX_LOWER_DEPTH: usize = 256;

/// Recursion limit for tree queries. Lowered trees stay below it.
pub const MAX_QUERY_DEPTH: usize = MAX_LOWER_DEPTH + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Program,
    /// `[callee, Arguments]`
    Invoke,
    Arguments,
    /// Parenthesized expression.
    Group,
    /// `[Parameters, body]`
    Function {
        name: Option<String>,
        declaration: bool,
    },
    Parameters,
    Block,
    Identifier(String),
    /// Raw literal text, quotes included.
    Str(String),
    Number(String),
    Boolean(bool),
    Null,
    Regex(String),
    /// Children are `Pair`s.
    Object,
    /// `[value]`
    Pair { key: String },
    Array,
    /// `[callee, Arguments]`
    New,
    /// `[target, value]`
    Assign,
    /// `[object]`
    Member { property: String },
    /// Children are `Declarator`s.
    Declaration,
    /// `[value]` when initialised.
    Declarator { name: String },
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte offsets into the source text.
    pub start: usize,
    pub end: usize,
    pub children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub const fn new(kind: NodeKind, start: usize, end: usize, children: Vec<Node>) -> Self {
        Self {
            kind,
            start,
            end,
            children,
        }
    }

    #[must_use]
    pub const fn leaf(kind: NodeKind, start: usize, end: usize) -> Self {
        Self::new(kind, start, end, Vec::new())
    }

    #[must_use]
    pub fn first_child(&self) -> Option<&Node> {
        self.children.first()
    }

    /// Callee of an invocation or `new` expression.
    #[must_use]
    pub fn callee(&self) -> Option<&Node> {
        match self.kind {
            NodeKind::Invoke | NodeKind::New => self.children.first(),
            _ => None,
        }
    }

    #[must_use]
    pub fn arguments(&self) -> Option<&Node> {
        match self.kind {
            NodeKind::Invoke | NodeKind::New => self
                .children
                .get(1)
                .filter(|node| node.kind == NodeKind::Arguments),
            _ => None,
        }
    }

    /// Body of a function literal or declaration.
    #[must_use]
    pub fn body(&self) -> Option<&Node> {
        match self.kind {
            NodeKind::Function { .. } => self.children.get(1),
            _ => None,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> Option<&Node> {
        match self.kind {
            NodeKind::Function { .. } => self.children.first(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_function(&self) -> bool {
        matches!(self.kind, NodeKind::Function { .. })
    }
}

/// Lower a tree-sitter tree over `source` into [`Node`]s.
#[must_use]
pub fn lower(root: TsNode<'_>, source: &str) -> Node {
    Lowering { source }.node(root, 0)
}

struct Lowering<'s> {
    source: &'s str,
}

impl Lowering<'_> {
    fn text(&self, node: TsNode<'_>) -> &str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    fn node(&self, node: TsNode<'_>, depth: usize) -> Node {
        let (start, end) = (node.start_byte(), node.end_byte());
        if depth > MAX_LOWER_DEPTH {
            log::debug!("Truncating syntax tree at byte {start}");
            return Node::leaf(NodeKind::Other(node.kind().to_string()), start, end);
        }
        let depth = depth + 1;

        match node.kind() {
            "program" => Node::new(NodeKind::Program, start, end, self.named(node, depth)),
            "expression_statement" => match self.named(node, depth).into_iter().next() {
                Some(expression) => expression,
                None => Node::leaf(NodeKind::Other("expression_statement".into()), start, end),
            },
            "parenthesized_expression" => {
                Node::new(NodeKind::Group, start, end, self.named(node, depth))
            }
            "call_expression" => self.invocation(node, NodeKind::Invoke, "function", depth),
            "new_expression" => self.invocation(node, NodeKind::New, "constructor", depth),
            "function" | "function_expression" | "function_declaration" | "generator_function"
            | "generator_function_declaration" | "arrow_function" | "method_definition" => {
                self.function(node, depth)
            }
            "identifier" | "shorthand_property_identifier" => Node::leaf(
                NodeKind::Identifier(self.text(node).to_string()),
                start,
                end,
            ),
            "string" => Node::leaf(NodeKind::Str(self.text(node).to_string()), start, end),
            "number" => Node::leaf(NodeKind::Number(self.text(node).to_string()), start, end),
            "true" => Node::leaf(NodeKind::Boolean(true), start, end),
            "false" => Node::leaf(NodeKind::Boolean(false), start, end),
            "null" => Node::leaf(NodeKind::Null, start, end),
            "regex" => Node::leaf(NodeKind::Regex(self.text(node).to_string()), start, end),
            "object" => self.object(node, depth),
            "array" => Node::new(NodeKind::Array, start, end, self.named(node, depth)),
            "assignment_expression" => {
                match (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    (Some(left), Some(right)) => Node::new(
                        NodeKind::Assign,
                        start,
                        end,
                        vec![self.node(left, depth), self.node(right, depth)],
                    ),
                    _ => self.generic(node, depth),
                }
            }
            "member_expression" => {
                match (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("property"),
                ) {
                    (Some(object), Some(property)) => Node::new(
                        NodeKind::Member {
                            property: self.text(property).to_string(),
                        },
                        start,
                        end,
                        vec![self.node(object, depth)],
                    ),
                    _ => self.generic(node, depth),
                }
            }
            "subscript_expression" => {
                match (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("index"),
                ) {
                    (Some(object), Some(index)) if index.kind() == "string" => Node::new(
                        NodeKind::Member {
                            property: strip_quotes(self.text(index)).to_string(),
                        },
                        start,
                        end,
                        vec![self.node(object, depth)],
                    ),
                    _ => self.generic(node, depth),
                }
            }
            "variable_declaration" | "lexical_declaration" => {
                Node::new(NodeKind::Declaration, start, end, self.named(node, depth))
            }
            "variable_declarator" => match node.child_by_field_name("name") {
                Some(name) if name.kind() == "identifier" => {
                    let children = node
                        .child_by_field_name("value")
                        .map(|value| vec![self.node(value, depth)])
                        .unwrap_or_default();
                    Node::new(
                        NodeKind::Declarator {
                            name: self.text(name).to_string(),
                        },
                        start,
                        end,
                        children,
                    )
                }
                _ => self.generic(node, depth),
            },
            "statement_block" => Node::new(NodeKind::Block, start, end, self.named(node, depth)),
            "formal_parameters" => self.parameters(node, depth),
            _ => self.generic(node, depth),
        }
    }

    fn generic(&self, node: TsNode<'_>, depth: usize) -> Node {
        Node::new(
            NodeKind::Other(node.kind().to_string()),
            node.start_byte(),
            node.end_byte(),
            self.named(node, depth),
        )
    }

    fn named(&self, node: TsNode<'_>, depth: usize) -> Vec<Node> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .map(|child| self.node(child, depth))
            .collect()
    }

    fn invocation(&self, node: TsNode<'_>, kind: NodeKind, callee_field: &str, depth: usize) -> Node {
        let Some(callee) = node.child_by_field_name(callee_field) else {
            return self.generic(node, depth);
        };
        let end = node.end_byte();
        let arguments = match node.child_by_field_name("arguments") {
            Some(args) if args.kind() == "arguments" => Node::new(
                NodeKind::Arguments,
                args.start_byte(),
                args.end_byte(),
                self.named(args, depth + 1),
            ),
            Some(other) => Node::new(
                NodeKind::Arguments,
                other.start_byte(),
                other.end_byte(),
                vec![self.node(other, depth + 1)],
            ),
            None => Node::leaf(NodeKind::Arguments, end, end),
        };
        Node::new(
            kind,
            node.start_byte(),
            end,
            vec![self.node(callee, depth), arguments],
        )
    }

    fn function(&self, node: TsNode<'_>, depth: usize) -> Node {
        let (start, end) = (node.start_byte(), node.end_byte());
        let declaration = node.kind().ends_with("_declaration");
        let name = node
            .child_by_field_name("name")
            .map(|name| self.text(name).to_string());

        let parameters = match (
            node.child_by_field_name("parameters"),
            node.child_by_field_name("parameter"),
        ) {
            (Some(params), _) => self.parameters(params, depth),
            (None, Some(single)) => Node::new(
                NodeKind::Parameters,
                single.start_byte(),
                single.end_byte(),
                vec![self.node(single, depth + 1)],
            ),
            (None, None) => Node::leaf(NodeKind::Parameters, start, start),
        };
        let body = node
            .child_by_field_name("body")
            .map_or_else(|| Node::leaf(NodeKind::Block, end, end), |body| self.node(body, depth));

        Node::new(
            NodeKind::Function { name, declaration },
            start,
            end,
            vec![parameters, body],
        )
    }

    fn parameters(&self, node: TsNode<'_>, depth: usize) -> Node {
        let mut cursor = node.walk();
        let children = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .map(|child| {
                let simple = match child.kind() {
                    "identifier" => Some(child),
                    "assignment_pattern" => child
                        .child_by_field_name("left")
                        .filter(|left| left.kind() == "identifier"),
                    "rest_pattern" => child
                        .named_child(0)
                        .filter(|inner| inner.kind() == "identifier"),
                    _ => None,
                };
                match simple {
                    Some(ident) => Node::leaf(
                        NodeKind::Identifier(self.text(ident).to_string()),
                        ident.start_byte(),
                        ident.end_byte(),
                    ),
                    None => self.node(child, depth + 1),
                }
            })
            .collect();
        Node::new(
            NodeKind::Parameters,
            node.start_byte(),
            node.end_byte(),
            children,
        )
    }

    fn object(&self, node: TsNode<'_>, depth: usize) -> Node {
        let mut cursor = node.walk();
        let children = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .map(|child| match child.kind() {
                "pair" => match (
                    child.child_by_field_name("key"),
                    child.child_by_field_name("value"),
                ) {
                    (Some(key), Some(value)) => Node::new(
                        NodeKind::Pair {
                            key: self.property_key(key),
                        },
                        child.start_byte(),
                        child.end_byte(),
                        vec![self.node(value, depth + 1)],
                    ),
                    _ => self.generic(child, depth + 1),
                },
                "shorthand_property_identifier" => {
                    let key = self.text(child).to_string();
                    Node::new(
                        NodeKind::Pair { key: key.clone() },
                        child.start_byte(),
                        child.end_byte(),
                        vec![Node::leaf(
                            NodeKind::Identifier(key),
                            child.start_byte(),
                            child.end_byte(),
                        )],
                    )
                }
                "method_definition" => match child.child_by_field_name("name") {
                    Some(name) => Node::new(
                        NodeKind::Pair {
                            key: self.property_key(name),
                        },
                        child.start_byte(),
                        child.end_byte(),
                        vec![self.function(child, depth + 2)],
                    ),
                    None => self.generic(child, depth + 1),
                },
                _ => self.node(child, depth),
            })
            .collect();
        Node::new(NodeKind::Object, node.start_byte(), node.end_byte(), children)
    }

    fn property_key(&self, key: TsNode<'_>) -> String {
        let text = self.text(key);
        if key.kind() == "string" {
            strip_quotes(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Drop the first and last character of a literal of length ≥ 2.
#[must_use]
pub fn strip_quotes(literal: &str) -> &str {
    let mut chars = literal.chars();
    match (chars.next(), chars.next_back()) {
        (Some(_), Some(_)) => chars.as_str(),
        _ => literal,
    }
}

/// Function literals invoked immediately, directly or via a grouping node.
///
/// Found functions are not searched further; their arguments are. Callers
/// recurse into each result to reach nested self-invocations.
pub fn self_invoked_functions(node: &Node) -> Result<Vec<&Node>, QueryError> {
    let mut found = Vec::new();
    collect_self_invoked(node, 0, &mut found)?;
    Ok(found)
}

fn collect_self_invoked<'a>(
    node: &'a Node,
    depth: usize,
    found: &mut Vec<&'a Node>,
) -> Result<(), QueryError> {
    if depth > MAX_QUERY_DEPTH {
        return Err(QueryError::DepthExceeded {
            limit: MAX_QUERY_DEPTH,
        });
    }
    for child in &node.children {
        if let Some(function) = invoked_literal(child) {
            found.push(function);
            for rest in child.children.iter().skip(1) {
                collect_self_invoked(rest, depth + 1, found)?;
            }
        } else {
            collect_self_invoked(child, depth + 1, found)?;
        }
    }
    Ok(())
}

fn invoked_literal(node: &Node) -> Option<&Node> {
    let callee = match node.kind {
        NodeKind::Invoke => node.callee()?,
        _ => return None,
    };
    match callee.kind {
        NodeKind::Function { .. } => Some(callee),
        NodeKind::Group => match callee.children.as_slice() {
            [only] if only.is_function() => Some(only),
            _ => None,
        },
        _ => None,
    }
}

/// Every invocation anywhere below `root` whose callee is the identifier `require`.
pub fn require_invocations(root: &Node) -> Result<Vec<&Node>, QueryError> {
    let mut found = Vec::new();
    collect_requires(root, 0, &mut found)?;
    Ok(found)
}

fn collect_requires<'a>(
    node: &'a Node,
    depth: usize,
    found: &mut Vec<&'a Node>,
) -> Result<(), QueryError> {
    if depth > MAX_QUERY_DEPTH {
        return Err(QueryError::DepthExceeded {
            limit: MAX_QUERY_DEPTH,
        });
    }
    if node.kind == NodeKind::Invoke
        && node.callee().and_then(Node::as_identifier) == Some("require")
    {
        found.push(node);
    }
    for child in &node.children {
        collect_requires(child, depth + 1, found)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsParser;

    fn parse(source: &str) -> Node {
        JsParser::new().parse_script(source).unwrap().root
    }

    #[test]
    fn statements_are_unwrapped() {
        let root = parse("a = 1;");
        assert_eq!(root.kind, NodeKind::Program);
        assert_eq!(root.children[0].kind, NodeKind::Assign);
        assert_eq!(
            root.children[0].children[0].as_identifier(),
            Some("a")
        );
    }

    #[test]
    fn both_iife_spellings_are_found() {
        let root = parse("(function () {}());\n(function () {})();\nfoo(function () {});");
        let found = self_invoked_functions(&root).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|node| node.is_function()));
    }

    #[test]
    fn nested_iife_is_not_returned_from_outer_search() {
        let root = parse("(function () { (function () {})(); })();");
        let outer = self_invoked_functions(&root).unwrap();
        assert_eq!(outer.len(), 1);
        let inner = self_invoked_functions(outer[0]).unwrap();
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn require_calls_at_any_depth() {
        let root = parse("var a = require('./a');\nfunction f() { return require(\"./b\").x; }\nother('./c');");
        assert_eq!(require_invocations(&root).unwrap().len(), 2);
    }

    fn height(node: &Node) -> usize {
        1 + node.children.iter().map(height).max().unwrap_or(0)
    }

    fn nested(open: &str, close: &str) -> String {
        let depth = MAX_LOWER_DEPTH * 4;
        format!(
            "require('./top');\nvar deep = {}0{};\nwindow.after = require('./after');\n",
            open.repeat(depth),
            close.repeat(depth)
        )
    }

    #[test]
    fn deep_nesting_is_truncated_below_the_query_limit() {
        for source in [
            nested("[", "]"),
            nested("f(", ")"),
            nested("{ m() { return ", "; } }"),
        ] {
            let root = parse(&source);
            assert_eq!(root.children.len(), 3);
            assert!(height(&root) <= MAX_QUERY_DEPTH);
            assert_eq!(require_invocations(&root).unwrap().len(), 2);
            assert_eq!(root.children[2].kind, NodeKind::Assign);
        }
    }

    #[test]
    fn deep_trees_fail_queries() {
        let mut node = Node::leaf(NodeKind::Null, 0, 0);
        for _ in 0..=MAX_QUERY_DEPTH + 1 {
            node = Node::new(NodeKind::Array, 0, 0, vec![node]);
        }
        assert_eq!(
            require_invocations(&node),
            Err(QueryError::DepthExceeded {
                limit: MAX_QUERY_DEPTH
            })
        );
    }

    #[test]
    fn strip_quotes_keeps_inner_text() {
        assert_eq!(strip_quotes("'./a'"), "./a");
        assert_eq!(strip_quotes("\"\""), "");
        assert_eq!(strip_quotes("x"), "x");
    }
}
