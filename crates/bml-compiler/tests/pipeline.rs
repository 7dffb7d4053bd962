use bml_compiler::{
    CompileOptions, ErrorCode, NodeId, TokenKind, compile, parse_str, tokenize,
};
use pretty_assertions::assert_eq;

const GALLERY: &str = r##"
// Reusable card type.
Card @ Rectangle {
    id: card
    radius: 4
    color: hovered ? "#eee" : "#fff"
    onClicked: { selected = !selected; }
    select(index): card.selectedIndex = index

    Text {
        id: title
        text: "Untitled"
    }
}

Column {
    id: gallery
    spacing: 8
    model: { first: 1, second: 2 }
    delegate: Card

    Card {
        id: first
        width: parent.width
    }
    Card {
        height: {
            var h = gallery.spacing * 10;
            return h;
        }
    }
}
"##;

#[test]
fn gallery_compiles() {
    let out = compile(GALLERY, &CompileOptions::default()).unwrap();
    let code = &out.code;

    assert!(code.starts_with("(function () {\n"));
    assert!(code.ends_with("}());\n"));
    assert!(code.contains("var gallery, first;"));
    assert!(code.contains("var Card = function (id, parent) {"));
    assert!(code.contains("var title;"));
    assert!(code.contains("var elem = new Rectangle(id, parent);"));
    assert!(code.contains(
        "elem.addProperty(\"color\", function () { return hovered ? \"#eee\" : \"#fff\"; });"
    ));
    assert!(code.contains(
        "elem.addEventHandler(\"onClicked\", function () { selected = !selected; });"
    ));
    assert!(code.contains(
        "elem.addFunction(\"select\", function (index) { card.selectedIndex = index; });"
    ));
    assert!(code.contains(
        "elem.addProperty(\"model\", function () { return { first: 1, second: 2 }; });"
    ));
    assert!(code.contains(
        "elem.addFunction(\"createDelegate\", function () { return new Card(\"\", elem); });"
    ));
    assert!(code.contains("return h;"));
    assert!(code.contains("root.initializeBindings();\n    root.render();\n"));
}

#[test]
fn balanced_input_closes_at_root() {
    let tree = parse_str(GALLERY).unwrap();
    let root = tree.root();
    assert_eq!(root.types.len(), 1);
    assert_eq!(root.elements.len(), 1);
    for (id, node) in tree.nodes().skip(1) {
        let parent = node.parent.expect("non-root node has a parent");
        let siblings = if node.is_type_definition() {
            &tree.node(parent).types
        } else {
            &tree.node(parent).elements
        };
        assert!(siblings.contains(&id));
    }
    assert_eq!(tree.node(NodeId::ROOT).parent, None);
}

#[test]
fn token_stream_examples() {
    let kinds = |src: &str| -> Vec<TokenKind> { tokenize(src).into_iter().map(|t| t.kind).collect() };
    assert_eq!(
        kinds("Element {\n}\n"),
        vec![TokenKind::Element("Element".into()), TokenKind::ScopeStart, TokenKind::ScopeEnd]
    );
    assert_eq!(
        kinds("Element {\nleft: 100;\n}\n"),
        vec![
            TokenKind::Element("Element".into()),
            TokenKind::ScopeStart,
            TokenKind::Expression("left".into()),
            TokenKind::Colon,
            TokenKind::Expression("100".into()),
            TokenKind::ScopeEnd,
        ]
    );
    assert!(tokenize("// comment\n").is_empty());
}

#[test]
fn grammar_errors() {
    let err = |src: &str| compile(src, &CompileOptions::default()).unwrap_err();

    let e = err("Element {\n    left: 1;\n    1prop: 1;\n}\n");
    assert_eq!(e.code, ErrorCode::InvalidPropertyName);
    assert_eq!(e.line, 3);

    assert_eq!(err("@ Base {\n}\n").code, ErrorCode::NoTypeName);
    assert_eq!(err("Element {\n    left: 1;\n").code, ErrorCode::UnexpectedEnd);
    assert_eq!(err("Element {\n    left 1\n}\n").code, ErrorCode::NoColon);
}

#[test]
fn error_report_is_actionable() {
    let e = compile("Item {\n  width: 1\n  2x: 3\n}", &CompileOptions::default()).unwrap_err();
    assert_eq!(
        e.report(),
        "line 3: INVALID_PROPERTY_NAME: property name `2x` starts with a digit\n    2x: 3"
    );
}

#[test]
fn output_is_deterministic() {
    let options = CompileOptions::default().with_module("Gallery").with_dump(true);
    let a = compile(GALLERY, &options).unwrap();
    let b = compile(GALLERY, &options).unwrap();
    assert_eq!(a, b);
}

#[test]
fn concurrent_compiles_do_not_interfere() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let src = format!("Item {{\n  width: {i}\n}}");
                compile(&src, &CompileOptions::default()).unwrap().code
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let code = handle.join().unwrap();
        assert!(code.contains(&format!("function () {{ return {i}; }}")));
    }
}

#[test]
fn return_heuristic_both_paths() {
    let code = compile(
        "Item {\n  a: 42\n  b: { if (x) return 1; return 2; }\n}",
        &CompileOptions::default(),
    )
    .unwrap()
    .code;
    assert!(code.contains("elem.addProperty(\"a\", function () { return 42; });"));
    assert!(code.contains(
        "elem.addProperty(\"b\", function () { if (x) return 1; return 2; });"
    ));
}

#[test]
fn handler_with_several_statements_on_one_line() {
    let out = compile("Item {\n  onClick: a(); b();\n}", &CompileOptions::default()).unwrap();
    assert!(out.code.contains("elem.addEventHandler(\"onClick\", function () { a(); b(); });"));
}

#[test]
fn sibling_elements_on_one_line_compile() {
    let tree = parse_str("A { B { x: 1 } C { y: 2 } }").unwrap();
    let a = tree.node(tree.root().elements[0]);
    let c = tree.node(a.elements[1]);
    assert_eq!(c.type_name, "C");
    assert_eq!(c.properties[0].name, "y");
    assert_eq!(c.properties[0].value, "2");
}
