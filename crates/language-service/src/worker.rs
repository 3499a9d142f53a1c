use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;
use url::Url;

use crate::cancellation::CancellationToken;
use crate::documents::{DocumentMap, ServiceDocument};
use crate::provider::ServiceProvider;
use crate::{DocumentPlan, LanguageService};

/// Generic fan-out driving one feature invocation.
///
/// For an opaque script the providers run against the script itself with
/// `doc_params`. For a generated script every virtual code is visited in
/// post-order; `map_params` translates the query through each document map
/// (an empty vec skips that virtual document), `work` invokes one provider,
/// and `transform` maps a raw result back into source coordinates (`None`
/// map for the opaque path). A provider `Err` is logged and skipped; it never
/// aborts the traversal.
///
/// With `combine` the results of all providers and virtual documents are
/// merged; without it the first transformable result wins and the traversal
/// stops.
pub(crate) async fn language_feature_worker<'env, T, K>(
    service: &'env LanguageService,
    uri: &Url,
    token: &CancellationToken,
    doc_params: impl Fn() -> K,
    map_params: impl Fn(&DocumentMap) -> Vec<K>,
    work: impl Fn(Arc<dyn ServiceProvider>, ServiceDocument, K) -> BoxFuture<'env, anyhow::Result<Option<T>>>,
    transform: impl Fn(T, Option<&DocumentMap>) -> Option<T>,
    combine: Option<fn(Vec<T>) -> T>,
) -> Option<T>
where
    K: Clone,
{
    if token.is_cancelled() {
        return None;
    }
    let plan = service.plan_for(uri)?;
    let providers = service.enabled_providers();
    let mut results = Vec::new();

    match plan {
        DocumentPlan::Opaque(document) => {
            let params = doc_params();
            for provider in &providers {
                if token.is_cancelled() {
                    return None;
                }
                match work(provider.clone(), document.clone(), params.clone()).await {
                    Ok(Some(result)) => {
                        if let Some(result) = transform(result, None) {
                            results.push(result);
                            if combine.is_none() {
                                break;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(error) => warn!(
                        provider = provider.name(),
                        document = %document.uri,
                        "analysis provider failed: {error:#}"
                    ),
                }
            }
        }
        DocumentPlan::Generated(plans) => {
            'traversal: for plan in &plans {
                for map in &plan.maps {
                    for params in map_params(map) {
                        for provider in &providers {
                            if token.is_cancelled() {
                                return None;
                            }
                            match work(provider.clone(), plan.document.clone(), params.clone())
                                .await
                            {
                                Ok(Some(result)) => {
                                    if let Some(result) = transform(result, Some(map)) {
                                        results.push(result);
                                        if combine.is_none() {
                                            break 'traversal;
                                        }
                                    }
                                }
                                Ok(None) => {}
                                Err(error) => warn!(
                                    provider = provider.name(),
                                    document = %plan.document.uri,
                                    "analysis provider failed: {error:#}"
                                ),
                            }
                        }
                    }
                }
            }
        }
    }

    if token.is_cancelled() || results.is_empty() {
        return None;
    }
    match combine {
        Some(merge) => Some(merge(results)),
        None => results.into_iter().next(),
    }
}

/// Whole-document variant: no query to translate, one provider pass per
/// virtual document whose map passes `valid`.
pub(crate) async fn document_feature_worker<'env, T>(
    service: &'env LanguageService,
    uri: &Url,
    token: &CancellationToken,
    valid: impl Fn(&DocumentMap) -> bool,
    work: impl Fn(Arc<dyn ServiceProvider>, ServiceDocument) -> BoxFuture<'env, anyhow::Result<Option<T>>>,
    transform: impl Fn(T, Option<&DocumentMap>) -> Option<T>,
    combine: Option<fn(Vec<T>) -> T>,
) -> Option<T> {
    language_feature_worker(
        service,
        uri,
        token,
        || (),
        |map| if valid(map) { vec![()] } else { Vec::new() },
        |provider, document, ()| work(provider, document),
        transform,
        combine,
    )
    .await
}
