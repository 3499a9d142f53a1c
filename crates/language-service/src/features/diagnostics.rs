use std::time::Duration;

use lsp_types::Diagnostic;
use url::Url;

use crate::cancellation::CancellationToken;
use crate::worker::document_feature_worker;
use crate::{LanguageService, dedupe, transform};

/// Collect diagnostics from every provider across every virtual document
/// whose mappings allow verification, mapped back to source ranges. Reports
/// whose mapping's `should_report` gate declines are dropped on the way back.
pub(crate) async fn diagnostics(
    service: &LanguageService,
    uri: &Url,
    token: &CancellationToken,
) -> Vec<Diagnostic> {
    let work_token = token.clone();
    document_feature_worker(
        service,
        uri,
        token,
        |map| {
            map.map
                .mappings()
                .iter()
                .any(|mapping| mapping.data.verification.enabled())
        },
        move |provider, document| {
            let token = work_token.clone();
            Box::pin(async move { provider.diagnostics(&document, &token).await })
        },
        |diagnostics, map| {
            Some(match map {
                Some(map) => diagnostics
                    .into_iter()
                    .filter_map(|diagnostic| transform::diagnostic(diagnostic, map))
                    .collect(),
                None => diagnostics,
            })
        },
        Some(merge_diagnostics),
    )
    .await
    .unwrap_or_default()
}

fn merge_diagnostics(all: Vec<Vec<Diagnostic>>) -> Vec<Diagnostic> {
    dedupe::with_diagnostics(all.into_iter().flatten().collect())
}

/// Batched revalidation over many scripts.
///
/// Between items the pass yields through a fixed debounce delay, and before
/// each item it re-checks both the cancellation token and the registry
/// revision captured at the start; any mutation in the meantime supersedes
/// the pass. Returns whether the pass ran to completion.
pub(crate) async fn validate_scripts(
    service: &LanguageService,
    ids: &[Url],
    delay: Duration,
    token: &CancellationToken,
    publish: &mut impl FnMut(Url, Vec<Diagnostic>),
) -> bool {
    let captured = service.with_registry(|registry| registry.revision());
    for (index, id) in ids.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(delay).await;
        }
        if token.is_cancelled() {
            return false;
        }
        if service.with_registry(|registry| registry.revision()) != captured {
            return false;
        }
        let result = diagnostics(service, id, token).await;
        if token.is_cancelled() {
            return false;
        }
        publish(id.clone(), result);
    }
    true
}
