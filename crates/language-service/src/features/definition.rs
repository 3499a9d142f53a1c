use std::sync::Arc;

use futures::future::BoxFuture;
use lsp_types::{LocationLink, Position, Range};
use rustc_hash::FxHashSet;
use url::Url;

use crate::cancellation::CancellationToken;
use crate::documents::ServiceDocument;
use crate::provider::ServiceProvider;
use crate::worker::language_feature_worker;
use crate::{LanguageService, dedupe, transform};

/// Definition lookup with linked-code expansion: when a definition lands on
/// a position that the target document's linked mappings alias (and the link
/// allows definitions), the provider is re-run at every alias instead of
/// reporting the intermediate hit, so the final links point at the ultimate
/// definition sites.
pub(crate) async fn definition(
    service: &LanguageService,
    uri: &Url,
    position: Position,
    token: &CancellationToken,
) -> Option<Vec<LocationLink>> {
    let work_token = token.clone();
    language_feature_worker(
        service,
        uri,
        token,
        || position,
        |map| map.to_generated_positions(position, |data| data.navigation.enabled()),
        move |provider, document, position| {
            let token = work_token.clone();
            Box::pin(async move {
                let mut visited = FxHashSet::default();
                let mut links = Vec::new();
                with_mirrors(
                    service,
                    &provider,
                    document,
                    position,
                    None,
                    &mut visited,
                    &mut links,
                    &token,
                )
                .await?;
                Ok((!links.is_empty()).then_some(links))
            })
        },
        |links, map| {
            let links: Vec<_> = links
                .into_iter()
                .filter_map(|link| transform::location_link(service, link, map, position))
                .collect();
            (!links.is_empty()).then_some(links)
        },
        Some(|all: Vec<Vec<LocationLink>>| {
            dedupe::with_location_links(all.into_iter().flatten().collect())
        }),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
fn with_mirrors<'a>(
    service: &'a LanguageService,
    provider: &'a Arc<dyn ServiceProvider>,
    document: ServiceDocument,
    position: Position,
    origin: Option<Range>,
    visited: &'a mut FxHashSet<(Url, Position)>,
    links: &'a mut Vec<LocationLink>,
    token: &'a CancellationToken,
) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
        if token.is_cancelled() {
            return Ok(());
        }
        if !visited.insert((document.uri.clone(), position)) {
            return Ok(());
        }
        let Some(definitions) = provider.definition(&document, position, token).await? else {
            return Ok(());
        };

        for definition in definitions {
            visited.insert((
                definition.target_uri.clone(),
                definition.target_range.start,
            ));
            let mut found_mirror = false;
            if let Some((target_document, linked_map)) =
                service.mirror_context(&definition.target_uri)
            {
                let offset = target_document.offset_at(definition.target_selection_range.start);
                let linked: Vec<usize> = linked_map
                    .linked_offsets(offset)
                    .filter(|(_, caps)| caps.definitions)
                    .map(|(offset, _)| offset)
                    .collect();
                for linked_offset in linked {
                    let linked_position = target_document.position_at(linked_offset);
                    if visited.contains(&(target_document.uri.clone(), linked_position)) {
                        continue;
                    }
                    found_mirror = true;
                    with_mirrors(
                        service,
                        provider,
                        target_document.clone(),
                        linked_position,
                        origin.or(definition.origin_selection_range),
                        &mut *visited,
                        &mut *links,
                        token,
                    )
                    .await?;
                }
            }
            if !found_mirror {
                links.push(LocationLink {
                    origin_selection_range: origin.or(definition.origin_selection_range),
                    ..definition
                });
            }
        }
        Ok(())
    })
}
