//! Feature fan-out over virtual-code trees.
//!
//! A [`LanguageService`] owns a [`ScriptRegistry`] and a set of per-notation
//! analysis providers. Each feature entry point resolves the queried script,
//! walks its virtual codes innermost-first, translates the query through the
//! capability-filtered source maps, invokes the providers on each virtual
//! document, and translates every result back into source coordinates before
//! merging.

mod cancellation;
mod dedupe;
mod documents;
mod features;
mod overlap;
mod provider;
mod transform;
mod worker;

pub use cancellation::CancellationToken;
pub use documents::{
    DocumentMap, LineIndex, ServiceDocument, parse_virtual_document_uri, virtual_document_uri,
};
pub use overlap::find_overlap_range;
pub use provider::ServiceProvider;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lsp_types::{
    CodeAction, CompletionList, Diagnostic, DocumentSymbol, Hover, Location, LocationLink,
    Position, Range, WorkspaceEdit,
};
use rustc_hash::{FxHashMap, FxHashSet};
use url::Url;
use weft_language_core::{LinkedCodeMap, ScriptRegistry, Snapshot, SnapshotId, VirtualCode};

/// Oldest line indexes are evicted once the cache grows past this; snapshot
/// ids are monotonic, so id order is generation order.
const LINE_INDEX_CACHE_CAP: usize = 1024;

/// The engine's front door: registry plus providers, shareable across
/// concurrent feature calls.
///
/// The registry lives behind a mutex with short hold times; no guard is ever
/// held across an await point, so overlapping requests interleave at provider
/// boundaries exactly as the cooperative model prescribes.
pub struct LanguageService {
    registry: Mutex<ScriptRegistry>,
    providers: Vec<Arc<dyn ServiceProvider>>,
    disabled_providers: Mutex<FxHashSet<String>>,
    line_indexes: Mutex<FxHashMap<SnapshotId, Arc<LineIndex>>>,
}

impl LanguageService {
    pub fn new(registry: ScriptRegistry, providers: Vec<Arc<dyn ServiceProvider>>) -> Self {
        Self {
            registry: Mutex::new(registry),
            providers,
            disabled_providers: Mutex::new(FxHashSet::default()),
            line_indexes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Run a closure against the registry (script set/delete/get, virtual
    /// code lookup). This is the outbound registry surface for the transport
    /// layer.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut ScriptRegistry) -> R) -> R {
        f(&mut self.registry())
    }

    /// Register or refresh a script; the usual reaction to a document
    /// open/change notification.
    pub fn update_script(&self, id: Url, language_id: impl Into<String>, snapshot: Snapshot) {
        let mut registry = self.registry();
        registry.set(id, language_id, snapshot);
    }

    pub fn remove_script(&self, id: &Url) {
        self.registry().delete(id);
    }

    /// Per-call provider switch; a disabled provider is skipped by every
    /// feature until re-enabled.
    pub fn set_provider_enabled(&self, name: &str, enabled: bool) {
        let mut disabled = lock(&self.disabled_providers);
        if enabled {
            disabled.remove(name);
        } else {
            disabled.insert(name.to_string());
        }
    }

    pub async fn hover(
        &self,
        uri: &Url,
        position: Position,
        token: &CancellationToken,
    ) -> Option<Hover> {
        features::hover::hover(self, uri, position, token).await
    }

    pub async fn completion(
        &self,
        uri: &Url,
        position: Position,
        token: &CancellationToken,
    ) -> Option<CompletionList> {
        features::completion::completion(self, uri, position, token).await
    }

    pub async fn definition(
        &self,
        uri: &Url,
        position: Position,
        token: &CancellationToken,
    ) -> Option<Vec<LocationLink>> {
        features::definition::definition(self, uri, position, token).await
    }

    pub async fn references(
        &self,
        uri: &Url,
        position: Position,
        token: &CancellationToken,
    ) -> Option<Vec<Location>> {
        features::references::references(self, uri, position, token).await
    }

    pub async fn rename(
        &self,
        uri: &Url,
        position: Position,
        new_name: &str,
        token: &CancellationToken,
    ) -> Option<WorkspaceEdit> {
        features::rename::rename(self, uri, position, new_name, token).await
    }

    pub async fn diagnostics(&self, uri: &Url, token: &CancellationToken) -> Vec<Diagnostic> {
        features::diagnostics::diagnostics(self, uri, token).await
    }

    pub async fn document_symbols(
        &self,
        uri: &Url,
        token: &CancellationToken,
    ) -> Option<Vec<DocumentSymbol>> {
        features::document_symbols::document_symbols(self, uri, token).await
    }

    pub async fn code_actions(
        &self,
        uri: &Url,
        range: Range,
        token: &CancellationToken,
    ) -> Option<Vec<CodeAction>> {
        features::code_actions::code_actions(self, uri, range, token).await
    }

    /// Revalidate a batch of scripts, publishing diagnostics per script.
    ///
    /// Yields control between items via a fixed debounce delay so newer
    /// requests can preempt the pass, and stops early — returning `false` —
    /// when the token fires or any registry mutation supersedes the captured
    /// revision.
    pub async fn validate_scripts(
        &self,
        ids: &[Url],
        delay: Duration,
        token: &CancellationToken,
        mut publish: impl FnMut(Url, Vec<Diagnostic>),
    ) -> bool {
        features::diagnostics::validate_scripts(self, ids, delay, token, &mut publish).await
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, ScriptRegistry> {
        lock(&self.registry)
    }

    pub(crate) fn enabled_providers(&self) -> Vec<Arc<dyn ServiceProvider>> {
        let disabled = lock(&self.disabled_providers);
        self.providers
            .iter()
            .filter(|provider| !disabled.contains(provider.name()))
            .cloned()
            .collect()
    }

    /// Build a provider-facing document, memoizing the line index per
    /// snapshot identity.
    pub(crate) fn document(
        &self,
        uri: Url,
        language_id: String,
        snapshot: Snapshot,
    ) -> ServiceDocument {
        let mut cache = lock(&self.line_indexes);
        if cache.len() > LINE_INDEX_CACHE_CAP {
            let mut ids: Vec<_> = cache.keys().copied().collect();
            ids.sort();
            for stale in &ids[..ids.len() / 2] {
                cache.remove(stale);
            }
        }
        let line_index = cache
            .entry(snapshot.id())
            .or_insert_with(|| Arc::new(LineIndex::new(snapshot.text())))
            .clone();
        ServiceDocument::from_parts(uri, language_id, snapshot, line_index)
    }

    /// Resolve the queried script into the per-request traversal plan: the
    /// opaque document itself, or every virtual code of its tree in
    /// post-order (embedded codes before the code containing them) with their
    /// cached maps.
    pub(crate) fn plan_for(&self, uri: &Url) -> Option<DocumentPlan> {
        let mut registry = self.registry();
        let script = registry.get(uri)?;
        let language_id = script.language_id.clone();
        let snapshot = script.snapshot.clone();
        let root = script
            .generated
            .as_ref()
            .map(|generated| generated.root.clone());

        let Some(root) = root else {
            drop(registry);
            return Some(DocumentPlan::Opaque(self.document(
                uri.clone(),
                language_id,
                snapshot,
            )));
        };

        let mut order = Vec::new();
        post_order(&root, &mut order);

        let mut plans = Vec::with_capacity(order.len());
        for code in order {
            let document = self.document(
                virtual_document_uri(uri, &code.id),
                code.language_id.clone(),
                code.snapshot.clone(),
            );
            let mut maps = Vec::new();
            for (script_id, (source_snapshot, map)) in registry.maps_for(code) {
                // Only maps against scripts whose generated tree is the one
                // being traversed; cross-tree mappings are reachable through
                // the other tree's own traversal.
                let source_language = match registry.get(&script_id) {
                    Some(script)
                        if script
                            .generated
                            .as_ref()
                            .is_some_and(|generated| Arc::ptr_eq(&generated.root, &root)) =>
                    {
                        script.language_id.clone()
                    }
                    _ => continue,
                };
                let source_document = self.document(script_id, source_language, source_snapshot);
                maps.push(DocumentMap {
                    source_document,
                    virtual_document: document.clone(),
                    map,
                });
            }
            plans.push(VirtualDocPlan { document, maps });
        }
        Some(DocumentPlan::Generated(plans))
    }

    /// The linked-code map of a virtual document, with the document itself,
    /// for mirror recursion. `None` when the uri is not a virtual document or
    /// its code has no linked mappings.
    pub(crate) fn mirror_context(
        &self,
        uri: &Url,
    ) -> Option<(ServiceDocument, Arc<LinkedCodeMap>)> {
        let (source_id, code_id) = parse_virtual_document_uri(uri)?;
        let mut registry = self.registry();
        let code_ref = registry.virtual_code(&source_id, &code_id)?;
        let code = code_ref.code()?;
        let linked = registry.linked_code_map(code)?;
        let document = self.document(uri.clone(), code.language_id.clone(), code.snapshot.clone());
        Some((document, linked))
    }

    /// All document maps of one virtual document, for translating results
    /// that landed in a document other than the queried one.
    pub(crate) fn maps_of_virtual_uri(&self, uri: &Url) -> Vec<DocumentMap> {
        let Some((source_id, code_id)) = parse_virtual_document_uri(uri) else {
            return Vec::new();
        };
        let mut registry = self.registry();
        let Some(code_ref) = registry.virtual_code(&source_id, &code_id) else {
            return Vec::new();
        };
        let Some(code) = code_ref.code() else {
            return Vec::new();
        };
        let document = self.document(uri.clone(), code.language_id.clone(), code.snapshot.clone());
        let mut result = Vec::new();
        for (script_id, (source_snapshot, map)) in registry.maps_for(code) {
            let source_language = registry
                .get(&script_id)
                .map(|script| script.language_id.clone())
                .unwrap_or_default();
            let source_document = self.document(script_id, source_language, source_snapshot);
            result.push(DocumentMap {
                source_document,
                virtual_document: document.clone(),
                map,
            });
        }
        result
    }
}

pub(crate) enum DocumentPlan {
    Opaque(ServiceDocument),
    Generated(Vec<VirtualDocPlan>),
}

pub(crate) struct VirtualDocPlan {
    pub document: ServiceDocument,
    pub maps: Vec<DocumentMap>,
}

fn post_order<'a>(code: &'a VirtualCode, out: &mut Vec<&'a VirtualCode>) {
    for child in &code.embedded_codes {
        post_order(child, out);
    }
    out.push(code);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
