use std::sync::Arc;

use futures::future::BoxFuture;
use lsp_types::{Location, Position};
use rustc_hash::FxHashSet;
use url::Url;

use crate::cancellation::CancellationToken;
use crate::documents::ServiceDocument;
use crate::provider::ServiceProvider;
use crate::worker::language_feature_worker;
use crate::{LanguageService, dedupe, transform};

/// Find-references with linked-code expansion, merged across all virtual
/// documents and deduplicated by source location.
pub(crate) async fn references(
    service: &LanguageService,
    uri: &Url,
    position: Position,
    token: &CancellationToken,
) -> Option<Vec<Location>> {
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
                let mut locations = Vec::new();
                with_mirrors(
                    service,
                    &provider,
                    document,
                    position,
                    &mut visited,
                    &mut locations,
                    &token,
                )
                .await?;
                Ok((!locations.is_empty()).then_some(locations))
            })
        },
        |locations, _map| {
            let locations: Vec<_> = locations
                .into_iter()
                .filter_map(|location| transform::location(service, location))
                .collect();
            (!locations.is_empty()).then_some(locations)
        },
        Some(|all: Vec<Vec<Location>>| dedupe::with_locations(all.into_iter().flatten().collect())),
    )
    .await
}

fn with_mirrors<'a>(
    service: &'a LanguageService,
    provider: &'a Arc<dyn ServiceProvider>,
    document: ServiceDocument,
    position: Position,
    visited: &'a mut FxHashSet<(Url, Position)>,
    locations: &'a mut Vec<Location>,
    token: &'a CancellationToken,
) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
        if token.is_cancelled() {
            return Ok(());
        }
        if !visited.insert((document.uri.clone(), position)) {
            return Ok(());
        }
        let Some(references) = provider.references(&document, position, token).await? else {
            return Ok(());
        };

        for reference in references {
            let mut found_mirror = false;
            if let Some((target_document, linked_map)) = service.mirror_context(&reference.uri) {
                let offset = target_document.offset_at(reference.range.start);
                let linked: Vec<usize> = linked_map
                    .linked_offsets(offset)
                    .filter(|(_, caps)| caps.references)
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
                        &mut *visited,
                        &mut *locations,
                        token,
                    )
                    .await?;
                }
            }
            if !found_mirror {
                locations.push(reference);
            }
        }
        Ok(())
    })
}
