//! LSP backend: document store, diagnostics, hover, and completion.

use std::collections::HashMap;
use std::sync::Arc;

use bml_compiler::{CompileError, parse_str};
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::analysis::{Context, completion_context, known_types, word_at};
use crate::knowledge::{KEY_SNIPPETS, describe_delegate, describe_key};

// ── Backend ───────────────────────────────────────────────────────────────────

pub struct Backend {
    client: Client,
    docs: Arc<RwLock<HashMap<Url, String>>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            docs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn update(&self, uri: Url, text: String) {
        let diagnostics = compile_diagnostics(&text);
        self.client
            .publish_diagnostics(uri.clone(), diagnostics, None)
            .await;
        self.docs.write().await.insert(uri, text);
    }
}

// ── LanguageServer impl ───────────────────────────────────────────────────────

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _params: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        " ".to_string(),
                        ":".to_string(),
                        "\n".to_string(),
                    ]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "bml-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "bml-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    // ── Document lifecycle ────────────────────────────────────────────────────

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.update(params.text_document.uri, params.text_document.text)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // FULL sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.into_iter().last() {
            self.update(params.text_document.uri, change.text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.docs.write().await.remove(&params.text_document.uri);
        self.client
            .publish_diagnostics(params.text_document.uri, Vec::new(), None)
            .await;
    }

    // ── Hover ─────────────────────────────────────────────────────────────────

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let pos = &params.text_document_position_params.position;

        let docs = self.docs.read().await;
        let Some(text) = docs.get(uri) else {
            return Ok(None);
        };

        Ok(hover_markdown(text, pos).map(markdown_hover))
    }

    // ── Completion ────────────────────────────────────────────────────────────

    async fn completion(
        &self,
        params: CompletionParams,
    ) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let pos = &params.text_document_position.position;

        let docs = self.docs.read().await;
        let Some(text) = docs.get(uri) else {
            return Ok(None);
        };

        let items = match completion_context(text, pos) {
            Context::Element => element_items(text, true),
            Context::Property { element } => property_items(text, &element),
            Context::Value { .. } => element_items(text, false),
        };

        Ok(Some(CompletionResponse::Array(items)))
    }
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

fn compile_diagnostics(text: &str) -> Vec<Diagnostic> {
    match parse_str(text) {
        Ok(_) => vec![],
        Err(e) => vec![error_diagnostic(text, &e)],
    }
}

fn error_diagnostic(text: &str, e: &CompileError) -> Diagnostic {
    // CompileError lines are 1-based; LSP positions are 0-based. The context
    // is the line remainder from the offending token, which locates the column.
    let line_idx = e.line.saturating_sub(1);
    let line_text = text.lines().nth(line_idx).unwrap_or("");
    let (start, end) = match line_text.rfind(e.context.as_str()) {
        Some(col) if !e.context.is_empty() => (col, col + e.context.len()),
        _ => (0, line_text.len()),
    };
    Diagnostic {
        range: Range {
            start: Position::new(line_idx as u32, start as u32),
            end: Position::new(line_idx as u32, end as u32),
        },
        severity: Some(DiagnosticSeverity::ERROR),
        code: Some(NumberOrString::String(e.code.to_string())),
        source: Some("bml-lsp".to_string()),
        message: e.message.clone(),
        ..Default::default()
    }
}

// ── Hover ─────────────────────────────────────────────────────────────────────

fn hover_markdown(text: &str, pos: &Position) -> Option<String> {
    let word = word_at(text, pos)?;

    // Type name hover: prefer the parsed tree, fall back to tokens for
    // documents that do not build.
    if word.starts_with(|c: char| c.is_uppercase()) {
        if let Ok(tree) = parse_str(text) {
            if let Some(def) = tree.find_type(word) {
                return Some(format!(
                    "**{}** extends **{}**\n\n{} properties, {} delegates, {} children · line {}",
                    def.type_name,
                    def.base_type_name().unwrap_or_default(),
                    def.properties.len(),
                    def.delegates.len(),
                    def.elements.len(),
                    def.line,
                ));
            }
        }
        return known_types(text).get(word).map(|base| match base {
            Some(base) => format!("**{word}** extends **{base}**"),
            None => format!("**{word}** · element type"),
        });
    }

    // Key hover: only when the word is the key of its `key: value` line.
    let line = text.lines().nth(pos.line as usize)?;
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if !key.starts_with(word) {
        return None;
    }
    let value = value.trim().trim_end_matches(';');
    let is_delegate = value.starts_with(|c: char| c.is_uppercase())
        && value.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if is_delegate && key != "id" {
        Some(describe_delegate(key, value))
    } else {
        Some(describe_key(key))
    }
}

// ── Completion item builders ──────────────────────────────────────────────────

fn element_items(text: &str, snippet: bool) -> Vec<CompletionItem> {
    known_types(text)
        .into_iter()
        .map(|(name, base)| {
            let detail = match &base {
                Some(base) => format!("extends {base}"),
                None => "element type".to_string(),
            };
            let mut item = CompletionItem::new_simple(name.clone(), detail);
            item.kind = Some(if base.is_some() {
                CompletionItemKind::CLASS
            } else {
                CompletionItemKind::STRUCT
            });
            if snippet {
                item.insert_text = Some(format!("{name} {{\n\t$0\n}}"));
                item.insert_text_format = Some(InsertTextFormat::SNIPPET);
            }
            item
        })
        .collect()
}

fn property_items(text: &str, element: &str) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = KEY_SNIPPETS
        .iter()
        .map(|s| {
            let mut item = CompletionItem::new_simple(s.label.to_string(), s.doc.to_string());
            item.kind = Some(CompletionItemKind::KEYWORD);
            item.insert_text = Some(s.insert.to_string());
            item.insert_text_format = Some(InsertTextFormat::SNIPPET);
            item
        })
        .collect();

    // Keys already used on elements of the same type elsewhere in the document.
    let Ok(tree) = parse_str(text) else {
        return items;
    };
    let mut seen: Vec<&str> = Vec::new();
    for (_, node) in tree.nodes() {
        if node.type_name != element {
            continue;
        }
        for p in &node.properties {
            if !seen.contains(&p.name.as_str()) {
                seen.push(&p.name);
            }
        }
    }
    items.extend(seen.into_iter().map(|name| {
        let mut item = CompletionItem::new_simple(name.to_string(), format!("used on {element}"));
        item.kind = Some(CompletionItemKind::PROPERTY);
        item.insert_text = Some(format!("{name}: $0"));
        item.insert_text_format = Some(InsertTextFormat::SNIPPET);
        item
    }));
    items
}

// ── Misc helpers ──────────────────────────────────────────────────────────────

fn markdown_hover(md: String) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: md,
        }),
        range: None,
    }
}
