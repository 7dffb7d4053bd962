//! Language server for `.bml` documents, speaking LSP over stdio.

use tower_lsp::{LspService, Server};

mod analysis;
mod backend;
mod knowledge;

use backend::Backend;

#[tokio::main]
async fn main() {
    // stdout carries the protocol; status goes to stderr.
    eprintln!("bml-lsp {} listening on stdio", env!("CARGO_PKG_VERSION"));

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
