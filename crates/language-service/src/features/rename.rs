use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use lsp_types::{Position, TextEdit, WorkspaceEdit};
use rustc_hash::{FxHashMap, FxHashSet};
use url::Url;

use crate::cancellation::CancellationToken;
use crate::documents::ServiceDocument;
use crate::provider::ServiceProvider;
use crate::transform::EditGate;
use crate::worker::language_feature_worker;
use crate::{LanguageService, dedupe, transform};

/// Rename with linked-code propagation.
///
/// On the way in, each crossed mapping may normalize the new name
/// (`resolve_rename_new_name`). Every edit the provider produces is checked
/// against the linked mappings of the document it lands in: if the edit
/// position has rename-enabled aliases, the provider is re-run at each alias
/// and the original edit is dropped — the alias runs produce the real edits.
/// On the way back, each crossed mapping may rewrite the edit text
/// (`resolve_rename_edit_text`).
pub(crate) async fn rename(
    service: &LanguageService,
    uri: &Url,
    position: Position,
    new_name: &str,
    token: &CancellationToken,
) -> Option<WorkspaceEdit> {
    let work_token = token.clone();
    let new_name = new_name.to_string();
    language_feature_worker(
        service,
        uri,
        token,
        || (position, new_name.clone()),
        |map| {
            let offset = map.source_document.offset_at(position);
            map.map
                .to_generated_offsets(offset, |data| data.navigation.should_rename())
                .map(|(generated, mapping)| {
                    (
                        map.virtual_document.position_at(generated),
                        mapping.data.navigation.resolve_new_name(&new_name),
                    )
                })
                .collect()
        },
        move |provider, document, (position, new_name)| {
            let token = work_token.clone();
            Box::pin(async move {
                let mut visited = FxHashSet::default();
                let mut changes: FxHashMap<Url, Vec<TextEdit>> = FxHashMap::default();
                with_mirrors(
                    service,
                    &provider,
                    document,
                    position,
                    &new_name,
                    &mut visited,
                    &mut changes,
                    &token,
                )
                .await?;
                if changes.is_empty() {
                    return Ok(None);
                }
                Ok(Some(WorkspaceEdit {
                    changes: Some(changes.into_iter().collect()),
                    ..Default::default()
                }))
            })
        },
        |edit, map| match map {
            Some(_) => transform::workspace_edit(service, edit, EditGate::Rename),
            None => Some(edit),
        },
        Some(merge_workspace_edits),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
fn with_mirrors<'a>(
    service: &'a LanguageService,
    provider: &'a Arc<dyn ServiceProvider>,
    document: ServiceDocument,
    position: Position,
    new_name: &'a str,
    visited: &'a mut FxHashSet<(Url, Position)>,
    changes: &'a mut FxHashMap<Url, Vec<TextEdit>>,
    token: &'a CancellationToken,
) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
        if token.is_cancelled() {
            return Ok(());
        }
        if !visited.insert((document.uri.clone(), position)) {
            return Ok(());
        }
        let Some(edit) = provider
            .rename_edits(&document, position, new_name, token)
            .await?
        else {
            return Ok(());
        };
        let Some(edit_changes) = edit.changes else {
            return Ok(());
        };

        for (edit_uri, edits) in edit_changes {
            let mirror = service.mirror_context(&edit_uri);
            for text_edit in edits {
                visited.insert((edit_uri.clone(), text_edit.range.start));
                let mut found_mirror = false;
                if let Some((mirror_document, linked_map)) = &mirror {
                    let offset = mirror_document.offset_at(text_edit.range.start);
                    let linked: Vec<usize> = linked_map
                        .linked_offsets(offset)
                        .filter(|(_, caps)| caps.rename)
                        .map(|(offset, _)| offset)
                        .collect();
                    for linked_offset in linked {
                        let linked_position = mirror_document.position_at(linked_offset);
                        if visited.contains(&(mirror_document.uri.clone(), linked_position)) {
                            continue;
                        }
                        found_mirror = true;
                        with_mirrors(
                            service,
                            provider,
                            mirror_document.clone(),
                            linked_position,
                            new_name,
                            &mut *visited,
                            &mut *changes,
                            token,
                        )
                        .await?;
                    }
                }
                if !found_mirror {
                    changes.entry(edit_uri.clone()).or_default().push(text_edit);
                }
            }
        }
        Ok(())
    })
}

fn merge_workspace_edits(edits: Vec<WorkspaceEdit>) -> WorkspaceEdit {
    let mut changes: HashMap<Url, Vec<TextEdit>> = HashMap::new();
    for edit in edits {
        if let Some(edit_changes) = edit.changes {
            for (uri, edits) in edit_changes {
                changes.entry(uri).or_default().extend(edits);
            }
        }
    }
    let changes = changes
        .into_iter()
        .map(|(uri, edits)| (uri, dedupe::with_text_edits(edits)))
        .collect();
    WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    }
}
