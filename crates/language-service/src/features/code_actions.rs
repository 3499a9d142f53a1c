use lsp_types::{CodeAction, Range};
use url::Url;

use crate::cancellation::CancellationToken;
use crate::transform::EditGate;
use crate::worker::language_feature_worker;
use crate::{LanguageService, transform};

/// Code actions for a source range.
///
/// The requested range rarely maps endpoint-for-endpoint into a virtual
/// document, so the overlap projection is used: the range is narrowed (or
/// nudged) to the portion the mappings actually cover before the providers
/// run. Actions whose workspace edit cannot map back are dropped.
pub(crate) async fn code_actions(
    service: &LanguageService,
    uri: &Url,
    range: Range,
    token: &CancellationToken,
) -> Option<Vec<CodeAction>> {
    let work_token = token.clone();
    language_feature_worker(
        service,
        uri,
        token,
        || range,
        |map| {
            map.find_overlap_range(range, |data| data.verification.enabled())
                .map(|mapped| vec![mapped])
                .unwrap_or_default()
        },
        move |provider, document, range| {
            let token = work_token.clone();
            Box::pin(async move { provider.code_actions(&document, range, &token).await })
        },
        |actions, map| {
            let actions: Vec<CodeAction> = actions
                .into_iter()
                .filter_map(|mut action| {
                    if let Some(map) = map {
                        if let Some(edit) = action.edit.take() {
                            action.edit =
                                transform::workspace_edit(service, edit, EditGate::Navigation);
                            if action.edit.is_none() {
                                return None;
                            }
                        }
                        if let Some(diagnostics) = action.diagnostics.take() {
                            action.diagnostics = Some(
                                diagnostics
                                    .into_iter()
                                    .filter_map(|diagnostic| {
                                        transform::diagnostic(diagnostic, map)
                                    })
                                    .collect(),
                            );
                        }
                    }
                    Some(action)
                })
                .collect();
            (!actions.is_empty()).then_some(actions)
        },
        Some(|all: Vec<Vec<CodeAction>>| all.into_iter().flatten().collect()),
    )
    .await
}
