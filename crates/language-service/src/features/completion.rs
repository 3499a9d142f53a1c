use lsp_types::{CompletionList, Position};
use serde_json::json;
use url::Url;

use crate::cancellation::CancellationToken;
use crate::worker::language_feature_worker;
use crate::{LanguageService, dedupe, transform};

/// Merge-all: every virtual document covering the position contributes, and
/// duplicate items (same label and text edit) surfacing from several virtual
/// documents collapse to one.
///
/// Each item's `data` is wrapped with the provider identity and the virtual
/// document uri, so a later resolve call can be routed back to whoever
/// produced the item.
pub(crate) async fn completion(
    service: &LanguageService,
    uri: &Url,
    position: Position,
    token: &CancellationToken,
) -> Option<CompletionList> {
    let work_token = token.clone();
    language_feature_worker(
        service,
        uri,
        token,
        || position,
        |map| map.to_generated_positions(position, |data| data.completion.enabled()),
        move |provider, document, position| {
            let token = work_token.clone();
            Box::pin(async move {
                let list = provider.completion(&document, position, &token).await?;
                Ok(list.map(|mut list| {
                    for item in &mut list.items {
                        item.data = Some(json!({
                            "provider": provider.name(),
                            "uri": document.uri.as_str(),
                            "original": item.data.take(),
                        }));
                    }
                    list
                }))
            })
        },
        |list, map| {
            Some(match map {
                Some(map) => transform::completion_list(list, map),
                None => list,
            })
        },
        Some(merge_completion_lists),
    )
    .await
}

fn merge_completion_lists(lists: Vec<CompletionList>) -> CompletionList {
    let is_incomplete = lists.iter().any(|list| list.is_incomplete);
    let items = dedupe::with_completion_items(lists.into_iter().flat_map(|list| list.items).collect());
    CompletionList {
        is_incomplete,
        items,
    }
}
