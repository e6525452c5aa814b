//! Lexical scopes resolved from the lowered tree.

use crate::ast::{Node, NodeKind};

/// Name of the global-object identifier.
pub const GLOBAL_OBJECT: &str = "window";

/// What an assignment or declaration put into a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Object,
    Array,
    Function,
    String,
    Number,
    Boolean,
    Null,
    Regex,
    /// `new C()`; holds the constructor path.
    Construct(String),
    /// Another identifier, resolved lazily through the scope chain.
    Reference(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub values: Vec<Value>,
    pub properties: Vec<Symbol>,
    /// Global object introduced only by member assignments like `window.x = 1`.
    pub implicit: bool,
}

impl Symbol {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            properties: Vec::new(),
            implicit: false,
        }
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Symbol> {
        self.properties.iter().find(|p| p.name == name)
    }

    fn property_mut(&mut self, name: &str) -> &mut Symbol {
        let index = match self.properties.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.properties.push(Symbol::new(name));
                self.properties.len() - 1
            }
        };
        &mut self.properties[index]
    }

    fn merge(&mut self, other: Symbol) {
        self.implicit &= other.implicit;
        for value in other.values {
            if !self.values.contains(&value) {
                self.values.push(value);
            }
        }
        for property in other.properties {
            let name = property.name.clone();
            self.property_mut(&name).merge(property);
        }
    }

    /// Follow `path` through properties, creating missing ones.
    fn descend(&mut self, path: &[String]) -> &mut Symbol {
        match path.split_first() {
            Some((head, rest)) => self.property_mut(head).descend(rest),
            None => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub start: usize,
    pub end: usize,
    pub symbols: Vec<Symbol>,
    pub children: Vec<Scope>,
}

impl Scope {
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn has_local_symbol(&self, name: &str) -> bool {
        self.symbol(name).is_some()
    }

    /// Deepest scope containing `offset`; `self` when no child does.
    #[must_use]
    pub fn scope_at_offset(&self, offset: usize) -> &Scope {
        self.children
            .iter()
            .find(|child| child.start <= offset && offset < child.end)
            .map_or(self, |child| child.scope_at_offset(offset))
    }

    /// Scopes enclosing `offset`, innermost first, ending with `self`.
    #[must_use]
    pub fn chain_at_offset(&self, offset: usize) -> Vec<&Scope> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(child) = current
            .children
            .iter()
            .find(|child| child.start <= offset && offset < child.end)
        {
            chain.push(child);
            current = child;
        }
        chain.reverse();
        chain
    }
}

/// Resolve the scopes of a program. The returned scope is the global one.
#[must_use]
pub fn build_scopes(root: &Node) -> Scope {
    let mut builder = ScopeBuilder {
        arena: vec![ScopeData::new(root.start, root.end, None)],
    };
    builder.walk(root, 0);
    builder.into_tree(0)
}

struct ScopeData {
    start: usize,
    end: usize,
    parent: Option<usize>,
    symbols: Vec<Symbol>,
    children: Vec<usize>,
}

impl ScopeData {
    const fn new(start: usize, end: usize, parent: Option<usize>) -> Self {
        Self {
            start,
            end,
            parent,
            symbols: Vec::new(),
            children: Vec::new(),
        }
    }
}

struct ScopeBuilder {
    arena: Vec<ScopeData>,
}

impl ScopeBuilder {
    fn walk(&mut self, node: &Node, scope: usize) {
        match &node.kind {
            NodeKind::Function { name, declaration } => self.function(node, name.as_deref(), *declaration, scope),
            NodeKind::Declaration => {
                for declarator in &node.children {
                    match &declarator.kind {
                        NodeKind::Declarator { name } => {
                            let symbol = match declarator.first_child() {
                                Some(value) => symbol_from(name, value),
                                None => Symbol::new(name.as_str()),
                            };
                            self.declare(scope, symbol);
                            for value in &declarator.children {
                                self.walk(value, scope);
                            }
                        }
                        _ => self.walk(declarator, scope),
                    }
                }
            }
            NodeKind::Assign => {
                let (Some(target), Some(value)) = (node.children.first(), node.children.get(1)) else {
                    return;
                };
                self.walk(value, scope);
                self.assign(target, value, scope);
            }
            _ => {
                for child in &node.children {
                    self.walk(child, scope);
                }
            }
        }
    }

    fn function(&mut self, node: &Node, name: Option<&str>, declaration: bool, scope: usize) {
        if let (true, Some(name)) = (declaration, name) {
            self.declare(
                scope,
                Symbol {
                    values: vec![Value::Function],
                    ..Symbol::new(name)
                },
            );
        }

        let Some(body) = node.body() else {
            return;
        };
        let inner = self.arena.len();
        self.arena.push(ScopeData::new(body.start, body.end, Some(scope)));
        self.arena[scope].children.push(inner);

        if let (false, Some(name)) = (declaration, name) {
            self.declare(
                inner,
                Symbol {
                    values: vec![Value::Function],
                    ..Symbol::new(name)
                },
            );
        }
        if let Some(parameters) = node.parameters() {
            for parameter in &parameters.children {
                match parameter.as_identifier() {
                    Some(ident) => self.declare(inner, Symbol::new(ident)),
                    None => self.walk(parameter, inner),
                }
            }
        }
        self.walk(body, inner);
    }

    fn assign(&mut self, target: &Node, value: &Node, scope: usize) {
        match &target.kind {
            NodeKind::Identifier(name) => {
                let owner = self.resolve(scope, name).unwrap_or(0);
                self.declare(owner, symbol_from(name, value));
            }
            NodeKind::Member { .. } => {
                let Some((root, path)) = member_path(target) else {
                    self.walk(target, scope);
                    return;
                };
                let owner = if root == GLOBAL_OBJECT {
                    Some(scope)
                } else {
                    self.resolve(scope, &root)
                };
                let Some(owner) = owner else {
                    return;
                };
                let Some((last, parents)) = path.split_last() else {
                    return;
                };
                let symbols = &mut self.arena[owner].symbols;
                let index = match symbols.iter().position(|s| s.name == root) {
                    Some(index) => index,
                    None => {
                        symbols.push(Symbol {
                            implicit: root == GLOBAL_OBJECT,
                            ..Symbol::new(root.as_str())
                        });
                        symbols.len() - 1
                    }
                };
                symbols[index]
                    .descend(parents)
                    .property_mut(last)
                    .merge(symbol_from(last, value));
            }
            _ => self.walk(target, scope),
        }
    }

    fn declare(&mut self, scope: usize, symbol: Symbol) {
        let symbols = &mut self.arena[scope].symbols;
        match symbols.iter_mut().find(|s| s.name == symbol.name) {
            Some(existing) => existing.merge(symbol),
            None => symbols.push(symbol),
        }
    }

    fn resolve(&self, mut scope: usize, name: &str) -> Option<usize> {
        loop {
            let data = &self.arena[scope];
            if data.symbols.iter().any(|s| s.name == name) {
                return Some(scope);
            }
            scope = data.parent?;
        }
    }

    fn into_tree(&mut self, index: usize) -> Scope {
        let children: Vec<usize> = std::mem::take(&mut self.arena[index].children);
        let symbols = std::mem::take(&mut self.arena[index].symbols);
        let (start, end) = (self.arena[index].start, self.arena[index].end);
        Scope {
            start,
            end,
            symbols,
            children: children.into_iter().map(|child| self.into_tree(child)).collect(),
        }
    }
}

/// `a.b.c` → `("a", ["b", "c"])`.
fn member_path(node: &Node) -> Option<(String, Vec<String>)> {
    let mut path = Vec::new();
    let mut current = node;
    loop {
        match &current.kind {
            NodeKind::Member { property } => {
                path.push(property.clone());
                current = current.first_child()?;
            }
            NodeKind::Identifier(root) => {
                path.reverse();
                return Some((root.clone(), path));
            }
            _ => return None,
        }
    }
}

fn symbol_from(name: &str, value: &Node) -> Symbol {
    let mut symbol = Symbol {
        values: vec![value_of(value)],
        ..Symbol::new(name)
    };
    if let Some(object) = object_literal(value) {
        for pair in &object.children {
            if let (NodeKind::Pair { key }, Some(inner)) = (&pair.kind, pair.first_child()) {
                symbol.property_mut(key).merge(symbol_from(key, inner));
            }
        }
    }
    symbol
}

fn object_literal(node: &Node) -> Option<&Node> {
    match &node.kind {
        NodeKind::Object => Some(node),
        NodeKind::Group => node.first_child().and_then(object_literal),
        NodeKind::Assign => node.children.get(1).and_then(object_literal),
        _ => None,
    }
}

fn value_of(node: &Node) -> Value {
    match &node.kind {
        NodeKind::Function { .. } => Value::Function,
        NodeKind::Object => Value::Object,
        NodeKind::Array => Value::Array,
        NodeKind::Str(_) => Value::String,
        NodeKind::Number(_) => Value::Number,
        NodeKind::Boolean(_) => Value::Boolean,
        NodeKind::Null => Value::Null,
        NodeKind::Regex(_) => Value::Regex,
        NodeKind::Identifier(name) => Value::Reference(name.clone()),
        NodeKind::New => match node.callee().and_then(dotted_name) {
            Some(constructor) => Value::Construct(constructor),
            None => Value::Unknown,
        },
        NodeKind::Group if node.children.len() == 1 => node.children.first().map_or(Value::Unknown, value_of),
        NodeKind::Assign => node.children.get(1).map_or(Value::Unknown, value_of),
        _ => Value::Unknown,
    }
}

fn dotted_name(node: &Node) -> Option<String> {
    let (root, path) = member_path(node)?;
    if path.is_empty() {
        Some(root)
    } else {
        Some(format!("{root}.{}", path.join(".")))
    }
}
