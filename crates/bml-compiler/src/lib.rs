//! Tokenizer, tree builder, and JavaScript code generator for the
//! **binding markup language** (`.bml`).
//!
//! This crate does no I/O. It is shared by the command-line compiler and the
//! language server.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`tokenizer`] | `Tokenizer`, `Token`, `TokenKind` |
//! | [`tree`] | `ObjectTree`, `Node`, `TreeBuilder` |
//! | [`codegen`] | `render_tree`, `RenderOptions`, `Binding` |
//! | [`compile`] | `compile`, `compile_with`, `CompileOptions` |
//! | [`error`] | `CompileError`, `ErrorCode` |
//!
//! # Quick start
//!
//! ```rust
//! use bml_compiler::{compile, CompileOptions};
//!
//! let src = r#"
//!     Column {
//!         id: main
//!         spacing: 8
//!         Text { text: "Hello" }
//!     }
//! "#;
//!
//! let out = compile(src, &CompileOptions::default().with_module("App")).unwrap();
//! assert!(out.code.starts_with("var App = function () {"));
//! ```

pub mod codegen;
pub mod compile;
pub mod error;
pub mod tokenizer;
pub mod tree;

pub use codegen::{RenderOptions, render_tree};
pub use compile::{Compilation, CompileOptions, compile, compile_with, parse_str};
pub use error::{CompileError, ErrorCode};
pub use tokenizer::{Token, TokenKind, tokenize};
pub use tree::{NodeId, NodeKind, ObjectTree, build_tree};
