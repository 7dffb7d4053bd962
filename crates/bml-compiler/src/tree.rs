//! Object tree built from the token stream.
//!
//! Nodes live in a flat arena owned by [`ObjectTree`]; parent links are plain
//! indices. Node `0` is always the synthetic root that aggregates the
//! top-level types and elements.

use std::fmt::{self, Write};

use serde::Serialize;

use crate::error::{CompileError, ErrorCode};
use crate::tokenizer::{Token, TokenKind};

// ── NodeId ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

// ── Node ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// The synthetic top-level aggregate.
    Root,
    /// `Type { ... }`
    Element,
    /// `Name @ Base { ... }`
    TypeDefinition { base: String },
}

/// A `name: value` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub line: usize,
}

/// A `name: Type` entry, compiled to a factory method instead of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delegate {
    pub name: String,
    pub target: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: Option<String>,
    /// Instantiated type for elements, declared name for type definitions.
    pub type_name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Nested type definitions, in source order.
    pub types: Vec<NodeId>,
    /// Nested element instances, in source order.
    pub elements: Vec<NodeId>,
    pub properties: Vec<Property>,
    pub delegates: Vec<Delegate>,
    /// Line of the opening `{` (0 for the root).
    pub line: usize,
}

impl Node {
    fn new(type_name: String, kind: NodeKind, parent: Option<NodeId>, line: usize) -> Self {
        Self {
            id: None,
            type_name,
            kind,
            parent,
            types: Vec::new(),
            elements: Vec::new(),
            properties: Vec::new(),
            delegates: Vec::new(),
            line,
        }
    }

    pub fn is_type_definition(&self) -> bool {
        matches!(self.kind, NodeKind::TypeDefinition { .. })
    }

    /// Base type name, present iff this node is a type definition.
    pub fn base_type_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::TypeDefinition { base } => Some(base),
            NodeKind::Root | NodeKind::Element => None,
        }
    }
}

// ── ObjectTree ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectTree {
    nodes: Vec<Node>,
}

impl ObjectTree {
    fn new() -> Self {
        Self { nodes: vec![Node::new(String::new(), NodeKind::Root, None, 0)] }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// All nodes in creation (pre-)order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every type definition in the document, at any depth.
    pub fn type_definitions(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_type_definition())
    }

    /// First type definition named `name`.
    pub fn find_type(&self, name: &str) -> Option<&Node> {
        self.type_definitions().find(|n| n.type_name == name)
    }

    /// Human-readable indented trace of the tree.
    pub fn dump(&self) -> String {
        self.to_string()
    }

    fn write_children(&self, id: NodeId, depth: usize, out: &mut impl Write) -> fmt::Result {
        let node = self.node(id);
        for &child in node.types.iter().chain(&node.elements) {
            self.write_node(child, depth, out)?;
        }
        Ok(())
    }

    fn write_node(&self, id: NodeId, depth: usize, out: &mut impl Write) -> fmt::Result {
        let node = self.node(id);
        let pad = "    ".repeat(depth);
        match &node.kind {
            NodeKind::TypeDefinition { base } => {
                writeln!(out, "{pad}type {} extends {}", node.type_name, base)?
            }
            NodeKind::Root | NodeKind::Element => writeln!(out, "{pad}element {}", node.type_name)?,
        }
        if let Some(ident) = &node.id {
            writeln!(out, "{pad}    id: {ident}")?;
        }
        for p in &node.properties {
            writeln!(out, "{pad}    property {}: {}", p.name, p.value)?;
        }
        for d in &node.delegates {
            writeln!(out, "{pad}    delegate {}: {}", d.name, d.target)?;
        }
        self.write_children(id, depth + 1, out)
    }

    fn push(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        let is_type = node.is_type_definition();
        self.nodes.push(node);
        let parent = &mut self.nodes[parent.0];
        if is_type {
            parent.types.push(id);
        } else {
            parent.elements.push(id);
        }
        id
    }
}

impl fmt::Display for ObjectTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_children(NodeId::ROOT, 0, f)
    }
}

// ── TreeBuilder ───────────────────────────────────────────────────────────

/// Single-pass builder over a token slice.
///
/// `pending_type` holds the last ELEMENT seen; `pending_definition` holds the
/// defined name once `@` has been read, at which point the next ELEMENT is
/// the base type.
pub struct TreeBuilder<'t> {
    tokens: &'t [Token],
    pos: usize,
    tree: ObjectTree,
    current: NodeId,
    pending_type: Option<&'t str>,
    pending_definition: Option<&'t str>,
}

impl<'t> TreeBuilder<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            tree: ObjectTree::new(),
            current: NodeId::ROOT,
            pending_type: None,
            pending_definition: None,
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    /// Error positioned at the last token, or line 1 for empty input.
    fn err_at_end(&self, code: ErrorCode, msg: impl Into<String>) -> CompileError {
        match self.tokens.last() {
            Some(tok) => CompileError::at(code, msg, tok),
            None => CompileError::new(code, msg, 1, ""),
        }
    }

    pub fn build(mut self) -> Result<ObjectTree, CompileError> {
        while let Some(tok) = self.advance() {
            match &tok.kind {
                TokenKind::Element(name) => self.element(tok, name)?,
                TokenKind::IsA => self.is_a(tok)?,
                TokenKind::ScopeStart => self.scope_start(tok)?,
                TokenKind::ScopeEnd => self.scope_end(tok)?,
                TokenKind::Expression(name) => self.property(tok, name)?,
                TokenKind::Colon => {
                    return Err(CompileError::at(
                        ErrorCode::NoProperty,
                        "':' without a property name before it",
                        tok,
                    ));
                }
                TokenKind::Semicolon => {}
            }
        }

        if let Some(name) = self.pending_definition.or(self.pending_type) {
            return Err(self.err_at_end(
                ErrorCode::UnexpectedEnd,
                format!("unexpected end of input after `{name}`, expected '{{'"),
            ));
        }
        if self.current != NodeId::ROOT {
            let node = self.tree.node(self.current);
            return Err(self.err_at_end(
                ErrorCode::UnexpectedEnd,
                format!(
                    "unexpected end of input, `{}` opened on line {} is not closed",
                    node.type_name, node.line
                ),
            ));
        }

        log::debug!("built object tree with {} nodes", self.tree.len());
        Ok(self.tree)
    }

    fn element(&mut self, tok: &Token, name: &'t str) -> Result<(), CompileError> {
        if let Some(prev) = self.pending_type {
            return Err(CompileError::at(
                ErrorCode::UnknownElement,
                format!("`{prev}` must be followed by '{{' or '@', found `{name}`"),
                tok,
            ));
        }
        self.pending_type = Some(name);
        Ok(())
    }

    fn is_a(&mut self, tok: &Token) -> Result<(), CompileError> {
        if self.pending_definition.is_some() {
            return Err(CompileError::at(
                ErrorCode::Generic,
                "a type definition takes exactly one base type",
                tok,
            ));
        }
        let Some(name) = self.pending_type.take() else {
            return Err(CompileError::at(
                ErrorCode::NoTypeName,
                "'@' must follow the name of the type being defined",
                tok,
            ));
        };
        self.pending_definition = Some(name);
        Ok(())
    }

    fn scope_start(&mut self, tok: &Token) -> Result<(), CompileError> {
        let Some(type_name) = self.pending_type.take() else {
            let msg = match self.pending_definition {
                Some(name) => format!("missing base type for `{name}` before '{{'"),
                None => "'{' must follow an element type".to_string(),
            };
            return Err(CompileError::at(ErrorCode::NoElementType, msg, tok));
        };

        let node = match self.pending_definition.take() {
            Some(defined) => Node::new(
                defined.to_string(),
                NodeKind::TypeDefinition { base: type_name.to_string() },
                Some(self.current),
                tok.line,
            ),
            None => Node::new(
                type_name.to_string(),
                NodeKind::Element,
                Some(self.current),
                tok.line,
            ),
        };
        self.current = self.tree.push(self.current, node);
        Ok(())
    }

    fn scope_end(&mut self, tok: &Token) -> Result<(), CompileError> {
        if let Some(name) = self.pending_definition.or(self.pending_type) {
            return Err(CompileError::at(
                ErrorCode::UnknownElement,
                format!("`{name}` must be followed by '{{'"),
                tok,
            ));
        }
        let Some(parent) = self.tree.node(self.current).parent else {
            return Err(CompileError::at(
                ErrorCode::Generic,
                "unmatched '}'",
                tok,
            ));
        };
        self.current = parent;
        Ok(())
    }

    fn property(&mut self, tok: &Token, name: &'t str) -> Result<(), CompileError> {
        if let Some(pending) = self.pending_definition.or(self.pending_type) {
            return Err(CompileError::at(
                ErrorCode::UnknownElement,
                format!("`{pending}` must be followed by '{{', found property `{name}`"),
                tok,
            ));
        }

        match self.advance() {
            Some(Token { kind: TokenKind::Colon, .. }) => {}
            _ => {
                return Err(CompileError::at(
                    ErrorCode::NoColon,
                    format!("expected ':' after property `{name}`"),
                    tok,
                ));
            }
        }

        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(CompileError::at(
                ErrorCode::InvalidPropertyName,
                format!("property name `{name}` starts with a digit"),
                tok,
            ));
        }
        if self.current == NodeId::ROOT {
            return Err(CompileError::at(
                ErrorCode::NoElementType,
                format!("property `{name}` is not inside an element"),
                tok,
            ));
        }

        let value = match self.peek() {
            Some(value @ Token { kind: TokenKind::Expression(v) | TokenKind::Element(v), .. })
                if name == "id" =>
            {
                if !is_identifier(v) {
                    return Err(CompileError::at(
                        ErrorCode::Generic,
                        format!("id `{v}` is not a valid identifier"),
                        value,
                    ));
                }
                self.tree.nodes[self.current.0].id = Some(v.clone());
                None
            }
            Some(Token { kind: TokenKind::Expression(v), line, .. }) => {
                Some(PropertyValue::Expression(v, *line))
            }
            Some(Token { kind: TokenKind::Element(target), line, .. }) => {
                Some(PropertyValue::Delegate(target, *line))
            }
            Some(other) => {
                return Err(CompileError::at(
                    ErrorCode::NoExpression,
                    format!("expected a value for property `{name}`, found {}", other.kind),
                    other,
                ));
            }
            None => {
                return Err(self.err_at_end(
                    ErrorCode::NoExpression,
                    format!("expected a value for property `{name}`"),
                ));
            }
        };
        self.pos += 1;

        let node = &mut self.tree.nodes[self.current.0];
        match value {
            Some(PropertyValue::Expression(v, line)) => node.properties.push(Property {
                name: name.to_string(),
                value: v.clone(),
                line,
            }),
            Some(PropertyValue::Delegate(target, line)) => node.delegates.push(Delegate {
                name: name.to_string(),
                target: target.clone(),
                line,
            }),
            None => {}
        }
        Ok(())
    }
}

enum PropertyValue<'t> {
    Expression(&'t String, usize),
    Delegate(&'t String, usize),
}

/// Ids become variable names in the generated code.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Build an [`ObjectTree`] from a token stream.
pub fn build_tree(tokens: &[Token]) -> Result<ObjectTree, CompileError> {
    TreeBuilder::new(tokens).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn build(src: &str) -> Result<ObjectTree, CompileError> {
        build_tree(&tokenize(src))
    }

    fn err(src: &str) -> CompileError {
        build(src).unwrap_err()
    }

    #[test]
    fn empty_input_is_empty_tree() {
        let tree = build("").unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root().kind, NodeKind::Root);
    }

    #[test]
    fn element_with_properties() {
        let tree = build("Item {\n  id: box\n  left: 100\n  onClick: go()\n}").unwrap();
        let item = tree.node(tree.root().elements[0]);
        assert_eq!(item.type_name, "Item");
        assert_eq!(item.kind, NodeKind::Element);
        assert_eq!(item.id.as_deref(), Some("box"));
        assert_eq!(item.parent, Some(NodeId::ROOT));
        let names: Vec<_> = item.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["left", "onClick"]);
        assert_eq!(item.properties[0].line, 3);
    }

    #[test]
    fn type_definition_and_instances() {
        let tree = build(
            "Button @ Item {\n  label: \"ok\"\n}\nButton {\n  Text {\n  }\n}\n",
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(root.types.len(), 1);
        assert_eq!(root.elements.len(), 1);

        let def = tree.node(root.types[0]);
        assert_eq!(def.type_name, "Button");
        assert_eq!(def.base_type_name(), Some("Item"));
        assert!(def.is_type_definition());

        let inst = tree.node(root.elements[0]);
        assert_eq!(inst.type_name, "Button");
        assert_eq!(inst.base_type_name(), None);
        assert_eq!(tree.node(inst.elements[0]).type_name, "Text");
        assert_eq!(tree.find_type("Button").map(|n| n.line), Some(1));
    }

    #[test]
    fn delegate_property() {
        let tree = build("List {\n  delegate: Row\n}").unwrap();
        let list = tree.node(tree.root().elements[0]);
        assert!(list.properties.is_empty());
        assert_eq!(
            list.delegates,
            vec![Delegate { name: "delegate".into(), target: "Row".into(), line: 2 }]
        );
    }

    #[test]
    fn nested_scopes_close_back_to_root() {
        let tree = build("A {\n B {\n  C {\n  }\n }\n D {\n }\n}\nE {\n}").unwrap();
        assert_eq!(tree.len(), 5);
        let a = tree.node(tree.root().elements[0]);
        assert_eq!(a.elements.len(), 2);
        assert_eq!(tree.root().elements.len(), 2);
    }

    #[test]
    fn digit_property_name() {
        let e = err("Item {\n  left: 1\n1prop: 1;\n}");
        assert_eq!(e.code, ErrorCode::InvalidPropertyName);
        assert_eq!(e.line, 3);
        assert_eq!(e.context, "1prop: 1;");
    }

    #[test]
    fn is_a_without_type_name() {
        let e = err("@ Item {\n}");
        assert_eq!(e.code, ErrorCode::NoTypeName);
        assert_eq!(e.line, 1);
    }

    #[test]
    fn second_base_type_is_rejected() {
        let e = err("Card @ Item @ Rect {\n}");
        assert_eq!(e.code, ErrorCode::Generic);
        assert_eq!(e.message, "a type definition takes exactly one base type");
        assert_eq!(e.context, "@ Rect {");
    }

    #[test]
    fn id_must_be_an_identifier() {
        let e = err("Item {\n  id: \"box\"\n}");
        assert_eq!(e.code, ErrorCode::Generic);
        assert_eq!(e.line, 2);
        assert_eq!(e.context, "\"box\"");
        assert_eq!(build("Item {\n  id: $box_1\n}").unwrap().node(NodeId(1)).id.as_deref(), Some("$box_1"));
    }

    #[test]
    fn semicolons_between_elements_are_ignored() {
        let tree = build("Item {};\nRow {};").unwrap();
        assert_eq!(tree.root().elements.len(), 2);
    }

    #[test]
    fn missing_close() {
        let e = err("Item {\n  left: 1\n");
        assert_eq!(e.code, ErrorCode::UnexpectedEnd);
        assert_eq!(e.line, 2);
    }

    #[test]
    fn scope_without_type() {
        assert_eq!(err("{\n}").code, ErrorCode::NoElementType);
        assert_eq!(err("Button @ {\n}").code, ErrorCode::NoElementType);
    }

    #[test]
    fn property_without_colon() {
        let e = err("Item {\n  left\n}");
        assert_eq!(e.code, ErrorCode::NoColon);
        assert_eq!(e.line, 2);
    }

    #[test]
    fn property_without_value() {
        assert_eq!(err("Item {\n  left:\n}").code, ErrorCode::NoExpression);
        assert_eq!(err("Item {\n  left:").code, ErrorCode::NoExpression);
    }

    #[test]
    fn colon_without_property() {
        assert_eq!(err("Item {\n  : 1\n}").code, ErrorCode::NoProperty);
    }

    #[test]
    fn dangling_element_type() {
        assert_eq!(err("Item Row {\n}").code, ErrorCode::UnknownElement);
        assert_eq!(err("Item {\n  Row\n}").code, ErrorCode::UnknownElement);
        assert_eq!(err("Item").code, ErrorCode::UnexpectedEnd);
    }

    #[test]
    fn unmatched_close_is_an_error() {
        let e = err("Item {\n}\n}");
        assert_eq!(e.code, ErrorCode::Generic);
        assert_eq!(e.line, 3);
    }

    #[test]
    fn property_at_root() {
        assert_eq!(err("left: 1").code, ErrorCode::NoElementType);
    }

    #[test]
    fn dump_trace() {
        let tree = build(
            "Button @ Item {\n  label: \"ok\"\n}\nColumn {\n  id: col\n  delegate: Button\n  Text {\n    text: \"hi\"\n  }\n}",
        )
        .unwrap();
        insta::assert_snapshot!(tree.dump(), @r#"
        type Button extends Item
            property label: "ok"
        element Column
            id: col
            delegate delegate: Button
            element Text
                property text: "hi"
        "#);
    }
}
