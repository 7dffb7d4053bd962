use crate::codegen::{RenderOptions, render_tree};
use crate::error::CompileError;
use crate::tokenizer::tokenize;
use crate::tree::{ObjectTree, build_tree};

/// Log target used for the `dump` tree trace.
pub const DUMP_TARGET: &str = "bml_compiler::dump";

// ── CompileOptions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name of the generated factory; `None` emits an anonymous wrapper.
    pub module: Option<String>,
    /// Produce a human-readable tree trace before rendering.
    pub dump: bool,
}

impl CompileOptions {
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.module = Some(name.into());
        self
    }

    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions { module: self.module.clone() }
    }
}

/// Result of a successful compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compilation {
    /// Generated JavaScript.
    pub code: String,
    /// Tree trace, when requested with [`CompileOptions::dump`].
    pub dump: Option<String>,
}

// ── entry points ──────────────────────────────────────────────────────────

/// Tokenize and build the object tree without generating code.
pub fn parse_str(src: &str) -> Result<ObjectTree, CompileError> {
    build_tree(&tokenize(src))
}

/// Compile `.bml` source to JavaScript.
///
/// The first grammar error aborts the compile; no partial output is produced.
pub fn compile(src: &str, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let tree = parse_str(src)?;

    let dump = options.dump.then(|| {
        let trace = tree.dump();
        for line in trace.lines() {
            log::info!(target: DUMP_TARGET, "{line}");
        }
        trace
    });

    let code = render_tree(&tree, &options.render_options());
    Ok(Compilation { code, dump })
}

/// Callback-style wrapper around [`compile`]: `done` receives the outcome
/// exactly once, before this function returns.
pub fn compile_with<R>(
    src: &str,
    options: &CompileOptions,
    done: impl FnOnce(Result<Compilation, CompileError>) -> R,
) -> R {
    done(compile(src, options))
}
