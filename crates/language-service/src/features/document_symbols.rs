use lsp_types::DocumentSymbol;
use url::Url;

use crate::cancellation::CancellationToken;
use crate::worker::document_feature_worker;
use crate::{LanguageService, transform};

/// Symbols from every structure-capable virtual document, concatenated.
/// Symbols whose range cannot map back are dropped; children are transformed
/// recursively.
pub(crate) async fn document_symbols(
    service: &LanguageService,
    uri: &Url,
    token: &CancellationToken,
) -> Option<Vec<DocumentSymbol>> {
    let work_token = token.clone();
    document_feature_worker(
        service,
        uri,
        token,
        |map| map.map.mappings().iter().any(|mapping| mapping.data.structure),
        move |provider, document| {
            let token = work_token.clone();
            Box::pin(async move { provider.document_symbols(&document, &token).await })
        },
        |symbols, map| {
            let symbols: Vec<_> = match map {
                Some(map) => symbols
                    .into_iter()
                    .filter_map(|symbol| transform::document_symbol(symbol, map))
                    .collect(),
                None => symbols,
            };
            (!symbols.is_empty()).then_some(symbols)
        },
        Some(|all: Vec<Vec<DocumentSymbol>>| all.into_iter().flatten().collect()),
    )
    .await
}
