//! Static knowledge about what each kind of `.bml` entry compiles to. Drives
//! hover documentation and key completions.

use bml_compiler::codegen::{Binding, factory_name};

/// Key snippets offered at property position.
pub struct KeySnippet {
    pub label: &'static str,
    pub insert: &'static str,
    pub doc: &'static str,
}

pub const KEY_SNIPPETS: &[KeySnippet] = &[
    KeySnippet {
        label: "id",
        insert: "id: $0",
        doc: "Instance identifier. Declared as a variable in the enclosing unit and passed to the constructor.",
    },
    KeySnippet {
        label: "on…",
        insert: "on${1:Event}: $0",
        doc: "Event handler, registered with `addEventHandler`.",
    },
    KeySnippet {
        label: "method(…)",
        insert: "${1:name}(${2}): $0",
        doc: "Method, attached with `addFunction`.",
    },
];

/// Markdown describing how the key `key` compiles.
pub fn describe_key(key: &str) -> String {
    if key == "id" {
        return "**id** · identifier\n\nNames this instance. Not a property: the element is \
                assigned to a variable of that name."
            .to_string();
    }
    match Binding::classify(key) {
        Binding::EventHandler { name, .. } => format!(
            "**{name}** · event handler\n\nCompiled to `elem.addEventHandler(\"{name}\", function () {{ ... }})`. \
             The value is a statement."
        ),
        Binding::Method { name, params } => format!(
            "**{name}({params})** · method\n\nCompiled to `elem.addFunction(\"{name}\", function ({params}) {{ ... }})`."
        ),
        Binding::Property => format!(
            "**{key}** · property\n\nCompiled to `elem.addProperty(\"{key}\", ...)`. Re-evaluated when \
             the properties it reads change. A value containing `return` is used as a function body."
        ),
    }
}

/// Markdown for a delegate entry `key: Target`.
pub fn describe_delegate(key: &str, target: &str) -> String {
    let factory = factory_name(key);
    format!(
        "**{key}** · delegate\n\nCompiled to a `{factory}()` factory that instantiates `{target}`."
    )
}
