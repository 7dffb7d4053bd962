//! JavaScript code generation from an [`ObjectTree`].
//!
//! The output drives an external runtime through six calls: `addProperty`,
//! `addEventHandler`, `addFunction`, `addChild`, `initializeBindings` and
//! `render`. Every element becomes an immediately invoked closure that
//! constructs the runtime object, attaches its bindings and children, and
//! hands it to its parent. A type definition (`Name @ Base`) becomes a
//! factory function that constructs `Base` and augments it.

use std::fmt::Write as _;

use crate::tree::{Delegate, NodeId, ObjectTree, Property};

const INDENT: &str = "    ";

/// The synthetic root aggregate emitted once per unit.
const ROOT_OBJECT: &[&str] = &[
    "var root = {",
    "    children: [],",
    "    addChild: function (child) {",
    "        this.children.push(child);",
    "        return child;",
    "    },",
    "    initializeBindings: function () {",
    "        for (var i = 0; i < this.children.length; ++i) {",
    "            this.children[i].initializeBindings();",
    "        }",
    "    },",
    "    render: function () {",
    "        for (var i = 0; i < this.children.length; ++i) {",
    "            this.children[i].render();",
    "        }",
    "    }",
    "};",
];

// ── RenderOptions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Name of the generated factory. `None` wraps the unit in an
    /// immediately invoked anonymous function instead.
    pub module: Option<String>,
}

impl RenderOptions {
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.module = Some(name.into());
        self
    }
}

// ── Renderer ──────────────────────────────────────────────────────────────

struct Renderer<'a> {
    tree: &'a ObjectTree,
    out: String,
    indent: usize,
}

impl<'a> Renderer<'a> {
    fn new(tree: &'a ObjectTree) -> Self {
        Self { tree, out: String::new(), indent: 0 }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn push_scope(&mut self) {
        self.indent += 1;
    }

    fn pop_scope(&mut self) {
        self.indent -= 1;
    }

    fn render(mut self, module: Option<&str>) -> String {
        match module {
            Some(name) => self.line(format!("var {name} = function () {{")),
            None => self.line("(function () {"),
        }
        self.push_scope();
        self.line("'use strict';");
        self.line("");

        let ids = self.scope_ids(NodeId::ROOT);
        if !ids.is_empty() {
            self.line(format!("var {};", ids.join(", ")));
            self.line("");
        }

        for text in ROOT_OBJECT {
            self.line(text);
        }
        self.line("");

        let tree = self.tree;
        let root = tree.root();
        for &id in &root.types {
            self.type_definition(id);
            self.line("");
        }
        for &id in &root.elements {
            self.element(id, "root");
            self.line("");
        }

        self.line("root.initializeBindings();");
        self.line("root.render();");
        if module.is_some() {
            self.line("return root;");
        }
        self.pop_scope();
        match module {
            Some(_) => self.line("};"),
            None => self.line("}());"),
        }
        self.out
    }

    /// Ids of the instances that share a variable scope with `scope`: its
    /// element descendants, without descending into nested type definitions.
    fn scope_ids(&self, scope: NodeId) -> Vec<&'a str> {
        let tree = self.tree;
        let mut ids = Vec::new();
        let mut stack: Vec<NodeId> = tree.node(scope).elements.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = tree.node(id);
            if let Some(ident) = &node.id {
                if !ids.contains(&ident.as_str()) {
                    ids.push(ident.as_str());
                }
            }
            stack.extend(node.elements.iter().rev());
        }
        ids
    }

    // ── nodes ─────────────────────────────────────────────────────────────

    fn element(&mut self, id: NodeId, parent: &str) {
        let tree = self.tree;
        let node = tree.node(id);
        self.line(format!("{parent}.addChild((function (parent) {{"));
        self.push_scope();
        let ident = js_string(node.id.as_deref().unwrap_or(""));
        self.line(format!("var elem = new {}({ident}, parent);", node.type_name));
        if let Some(ident) = &node.id {
            self.line(format!("{ident} = elem;"));
        }
        self.body(id);
        self.line("return elem;");
        self.pop_scope();
        self.line(format!("}}({parent})));"));
    }

    fn type_definition(&mut self, id: NodeId) {
        let tree = self.tree;
        let node = tree.node(id);
        let base = node.base_type_name().unwrap_or_default();
        self.line(format!("var {} = function (id, parent) {{", node.type_name));
        self.push_scope();
        let ids = self.scope_ids(id);
        if !ids.is_empty() {
            self.line(format!("var {};", ids.join(", ")));
        }
        self.line(format!("var elem = new {base}(id, parent);"));
        if let Some(ident) = &node.id {
            self.line(format!("var {ident} = elem;"));
        }
        self.body(id);
        self.line("return elem;");
        self.pop_scope();
        self.line("};");
    }

    fn body(&mut self, id: NodeId) {
        let tree = self.tree;
        let node = tree.node(id);
        for property in &node.properties {
            self.property(property);
        }
        for delegate in &node.delegates {
            self.delegate(delegate);
        }
        for &child in &node.types {
            self.type_definition(child);
        }
        for &child in &node.elements {
            self.element(child, "elem");
        }
    }

    // ── bindings ──────────────────────────────────────────────────────────

    fn property(&mut self, property: &Property) {
        let line = match Binding::classify(&property.name) {
            Binding::EventHandler { name, params } => format!(
                "elem.addEventHandler({}, function ({params}) {{ {} }});",
                js_string(name),
                statement_body(&property.value),
            ),
            Binding::Method { name, params } => format!(
                "elem.addFunction({}, function ({params}) {{ {} }});",
                js_string(name),
                statement_body(&property.value),
            ),
            Binding::Property => format!(
                "elem.addProperty({}, function () {{ {} }});",
                js_string(&property.name),
                accessor_body(&property.value),
            ),
        };
        self.line(line);
    }

    fn delegate(&mut self, delegate: &Delegate) {
        self.line(format!(
            "elem.addFunction({}, function () {{ return new {}(\"\", elem); }});",
            js_string(&factory_name(&delegate.name)),
            delegate.target,
        ));
    }
}

// ── property classification ───────────────────────────────────────────────

/// How a property key compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'k> {
    /// `onClicked: ...` or `onKey(event): ...`
    EventHandler { name: &'k str, params: &'k str },
    /// `name(args): ...`
    Method { name: &'k str, params: &'k str },
    /// `name: expression`
    Property,
}

impl<'k> Binding<'k> {
    pub fn classify(key: &'k str) -> Self {
        let (name, params) = split_signature(key);
        if is_event_handler(name) {
            Binding::EventHandler { name, params: params.unwrap_or("") }
        } else if let Some(params) = params {
            Binding::Method { name, params }
        } else {
            Binding::Property
        }
    }
}

/// Any name with the `on` prefix: `onClicked`, `onclick`, `onKey`.
fn is_event_handler(name: &str) -> bool {
    name.starts_with("on")
}

/// Split `name(a, b)` into `("name", Some("a, b"))`.
fn split_signature(key: &str) -> (&str, Option<&str>) {
    let Some(open) = key.find('(') else {
        return (key.trim(), None);
    };
    let close = key.rfind(')').filter(|&c| c > open).unwrap_or(key.len());
    (key[..open].trim(), Some(key[open + 1..close].trim()))
}

/// Body of a property accessor.
///
/// A value mentioning `return` anywhere is taken as a complete function body;
/// anything else is wrapped as `return <value>;`. This is a plain substring
/// test, so an expression such as `returnValue + 1` is emitted verbatim.
pub fn accessor_body(value: &str) -> String {
    if value.contains("return") {
        value.to_string()
    } else {
        format!("return {value};")
    }
}

/// Body of an event handler or method.
pub fn statement_body(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value.ends_with(';') || value.ends_with('}') {
        value.to_string()
    } else {
        format!("{value};")
    }
}

/// Name of the factory method generated for the delegate `name`:
/// `delegate` becomes `createDelegate`.
pub fn factory_name(name: &str) -> String {
    format!("create{}", capitalize(name))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Double-quoted JavaScript string literal.
fn js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render `tree` as a JavaScript unit.
pub fn render_tree(tree: &ObjectTree, options: &RenderOptions) -> String {
    let code = Renderer::new(tree).render(options.module.as_deref());
    log::debug!("rendered {} nodes into {} bytes", tree.len(), code.len());
    code
}
