use lsp_types::{Hover, Position};
use url::Url;

use crate::cancellation::CancellationToken;
use crate::worker::language_feature_worker;
use crate::{LanguageService, transform};

/// First virtual document (innermost first) whose provider produces a hover
/// wins; the hover range is mapped back preferring the source range that
/// contains the queried position.
pub(crate) async fn hover(
    service: &LanguageService,
    uri: &Url,
    position: Position,
    token: &CancellationToken,
) -> Option<Hover> {
    let work_token = token.clone();
    language_feature_worker(
        service,
        uri,
        token,
        || position,
        |map| map.to_generated_positions(position, |data| data.semantic.enabled()),
        move |provider, document, position| {
            let token = work_token.clone();
            Box::pin(async move { provider.hover(&document, position, &token).await })
        },
        |hover, map| match map {
            Some(map) => transform::hover(hover, map, position),
            None => Some(hover),
        },
        None,
    )
    .await
}
