use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use url::Url;
use weft_source_map::SourceMap;

use crate::code_information::CodeInformation;
use crate::linked_code_map::LinkedCodeMap;
use crate::plugin::LanguagePlugin;
use crate::snapshot::{Snapshot, SnapshotId};
use crate::virtual_code::VirtualCode;

/// Source maps of one virtual code, keyed by the source script each mapping
/// group targets.
pub type ScriptMaps = FxHashMap<Url, (Snapshot, Arc<SourceMap<CodeInformation>>)>;

/// Callback consulted before every [`ScriptRegistry::get`], giving an
/// external document manager the chance to push the freshest content.
///
/// Return `None` when the registry's view is already current. When returning
/// `Some`, an unchanged document must be reported with the *same* snapshot
/// clone (same identity); handing out a fresh snapshot of equal text forces a
/// regeneration.
pub type SyncHook = Box<dyn FnMut(&Url) -> Option<(String, Snapshot)> + Send>;

/// The generated half of a script entry.
pub struct Generated {
    pub root: Arc<VirtualCode>,
    /// Index of the owning plugin in the registry's plugin list.
    pub plugin: usize,
    /// Code id → child-index path from the root. Rebuilt wholesale whenever
    /// the tree regenerates; stale nested entries never survive.
    pub embedded_code_index: FxHashMap<String, Vec<usize>>,
}

/// One known source document and its derived state.
pub struct SourceScript {
    pub id: Url,
    pub language_id: String,
    pub snapshot: Snapshot,
    pub generated: Option<Generated>,
    /// Plugin that accepted this script at creation, remembered across a
    /// failed regeneration so the next snapshot change can retry it.
    accepted_plugin: Option<usize>,
}

/// Resolves a virtual code inside a script's tree without borrowing the
/// registry: the tree is held alive by the `Arc`, the path locates the node.
#[derive(Clone)]
pub struct VirtualCodeRef {
    pub root: Arc<VirtualCode>,
    pub path: Vec<usize>,
}

impl VirtualCodeRef {
    pub fn code(&self) -> Option<&VirtualCode> {
        let mut code = self.root.as_ref();
        for &child in &self.path {
            code = code.embedded_codes.get(child)?;
        }
        Some(code)
    }
}

/// Owns the set of known source scripts and their generated virtual-code
/// trees, regenerating incrementally as snapshots change.
///
/// All derived views (source maps, linked-code maps) are memoized here, keyed
/// by snapshot identity, and purged the moment the snapshots they belong to
/// leave the live tree.
pub struct ScriptRegistry {
    plugins: Vec<Arc<dyn LanguagePlugin>>,
    scripts: FxHashMap<Url, SourceScript>,
    /// Virtual-code snapshot id → owning script id, for every code in a live
    /// tree.
    code_owners: FxHashMap<SnapshotId, Url>,
    maps: FxHashMap<SnapshotId, ScriptMaps>,
    linked: FxHashMap<SnapshotId, Option<Arc<LinkedCodeMap>>>,
    sync: Option<SyncHook>,
    revision: u64,
}

impl ScriptRegistry {
    pub fn new(plugins: Vec<Arc<dyn LanguagePlugin>>) -> Self {
        Self {
            plugins,
            scripts: FxHashMap::default(),
            code_owners: FxHashMap::default(),
            maps: FxHashMap::default(),
            linked: FxHashMap::default(),
            sync: None,
            revision: 0,
        }
    }

    pub fn with_sync(mut self, sync: SyncHook) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn plugins(&self) -> &[Arc<dyn LanguagePlugin>] {
        &self.plugins
    }

    /// Monotonic counter bumped by every mutation; batch passes capture it to
    /// detect supersession.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn ids(&self) -> impl Iterator<Item = &Url> {
        self.scripts.keys()
    }

    /// Register or refresh a script.
    ///
    /// Re-setting with the same snapshot identity is a no-op. A changed
    /// language id deletes and recreates the entry. A changed snapshot runs
    /// the owning plugin's incremental update (full regeneration when the
    /// plugin has none).
    pub fn set(
        &mut self,
        id: Url,
        language_id: impl Into<String>,
        snapshot: Snapshot,
    ) -> &SourceScript {
        let language_id = language_id.into();

        enum Action {
            Unchanged,
            Recreate,
            Update,
            Create,
        }
        let action = match self.scripts.get(&id) {
            None => Action::Create,
            Some(script) if script.language_id != language_id => Action::Recreate,
            Some(script) if script.snapshot.id() == snapshot.id() => Action::Unchanged,
            Some(_) => Action::Update,
        };

        match action {
            Action::Unchanged => {}
            Action::Create => self.create(id.clone(), language_id, snapshot),
            Action::Recreate => {
                self.delete(&id);
                self.create(id.clone(), language_id, snapshot);
            }
            Action::Update => self.update(&id, snapshot),
        }

        self.scripts.get(&id).expect("script present after set")
    }

    /// Remove a script, disposing its generated tree and dropping every
    /// nested embedded code with it.
    pub fn delete(&mut self, id: &Url) {
        let Some(script) = self.scripts.remove(id) else {
            return;
        };
        self.revision += 1;
        if let Some(generated) = &script.generated {
            let plugin = self.plugins[generated.plugin].clone();
            plugin.dispose_virtual_code(id, &generated.root);
            self.purge_generated(generated);
        }
    }

    /// Look a script up, consulting the sync hook first so an external
    /// document manager can push the latest snapshot before a stale read.
    pub fn get(&mut self, id: &Url) -> Option<&SourceScript> {
        self.sync_script(id);
        self.scripts.get(id)
    }

    /// Locate one virtual code by owning script and code id.
    pub fn virtual_code(&mut self, source_id: &Url, code_id: &str) -> Option<VirtualCodeRef> {
        let script = self.get(source_id)?;
        let generated = script.generated.as_ref()?;
        let path = generated.embedded_code_index.get(code_id)?.clone();
        Some(VirtualCodeRef {
            root: generated.root.clone(),
            path,
        })
    }

    /// Which script a virtual code belongs to.
    pub fn script_of(&self, code: &VirtualCode) -> Option<&SourceScript> {
        let owner = self.code_owners.get(&code.snapshot.id())?;
        self.scripts.get(owner)
    }

    /// The (cached) source maps of one virtual code, one per source script
    /// its mappings target. Mappings without an explicit `source` map against
    /// the owning script.
    pub fn maps_for(&mut self, code: &VirtualCode) -> ScriptMaps {
        let mut sources: Vec<Option<&Url>> = Vec::new();
        for mapping in &code.mappings {
            let source = mapping.source.as_ref();
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let owner = self.code_owners.get(&code.snapshot.id());
        let mut resolved: Vec<(Option<Url>, Url, Snapshot)> = Vec::new();
        for source in sources {
            let script_id = match source {
                Some(url) => url.clone(),
                None => match owner {
                    Some(url) => url.clone(),
                    None => continue,
                },
            };
            let Some(script) = self.scripts.get(&script_id) else {
                continue;
            };
            resolved.push((source.cloned(), script_id, script.snapshot.clone()));
        }

        let cache = self.maps.entry(code.snapshot.id()).or_default();
        for (source, script_id, snapshot) in resolved {
            let fresh = matches!(cache.get(&script_id), Some((cached, _)) if cached.id() == snapshot.id());
            if !fresh {
                let mappings = code
                    .mappings
                    .iter()
                    .filter(|mapping| mapping.source == source)
                    .cloned()
                    .collect();
                cache.insert(script_id, (snapshot, Arc::new(SourceMap::new(mappings))));
            }
        }
        cache.clone()
    }

    /// The (cached) linked-code map of one virtual code, `None` when the
    /// generator produced no linked mappings.
    pub fn linked_code_map(&mut self, code: &VirtualCode) -> Option<Arc<LinkedCodeMap>> {
        self.linked
            .entry(code.snapshot.id())
            .or_insert_with(|| {
                if code.linked_code_mappings.is_empty() {
                    None
                } else {
                    Some(Arc::new(LinkedCodeMap::new(
                        code.linked_code_mappings.clone(),
                    )))
                }
            })
            .clone()
    }

    fn sync_script(&mut self, id: &Url) {
        let mut hook = self.sync.take();
        if let Some(hook_fn) = hook.as_mut()
            && let Some((language_id, snapshot)) = hook_fn(id)
        {
            self.set(id.clone(), language_id, snapshot);
        }
        self.sync = hook;
    }

    fn create(&mut self, id: Url, language_id: String, snapshot: Snapshot) {
        self.revision += 1;

        let mut generated = None;
        let mut accepted = None;
        for index in 0..self.plugins.len() {
            let plugin = self.plugins[index].clone();
            match plugin.create_virtual_code(&id, &language_id, &snapshot) {
                Ok(Some(root)) => {
                    generated = Some((root, index));
                    accepted = Some(index);
                    break;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        script = %id,
                        plugin = plugin.name(),
                        "virtual code generation failed: {error:#}"
                    );
                    accepted = Some(index);
                    break;
                }
            }
        }

        let generated = generated.map(|(root, plugin)| self.index_generated(&id, root, plugin));
        self.scripts.insert(
            id.clone(),
            SourceScript {
                id,
                language_id,
                snapshot,
                generated,
                accepted_plugin: accepted,
            },
        );
    }

    fn update(&mut self, id: &Url, snapshot: Snapshot) {
        let Some(mut script) = self.scripts.remove(id) else {
            return;
        };
        self.revision += 1;

        if let Some(generated) = script.generated.take() {
            self.purge_generated(&generated);
            let plugin = self.plugins[generated.plugin].clone();
            let root = match plugin.update_virtual_code(id, &generated.root, &snapshot) {
                Ok(Some(root)) => Some(root),
                Ok(None) => {
                    debug!(script = %id, plugin = plugin.name(), "no incremental path, regenerating");
                    match plugin.create_virtual_code(id, &script.language_id, &snapshot) {
                        Ok(root) => root,
                        Err(error) => {
                            warn!(
                                script = %id,
                                plugin = plugin.name(),
                                "virtual code regeneration failed: {error:#}"
                            );
                            None
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        script = %id,
                        plugin = plugin.name(),
                        "incremental virtual code update failed: {error:#}"
                    );
                    None
                }
            };
            script.generated = root.map(|root| self.index_generated(id, root, generated.plugin));
        } else if let Some(index) = script.accepted_plugin {
            // A previous generation failed; retry with the accepting plugin.
            let plugin = self.plugins[index].clone();
            match plugin.create_virtual_code(id, &script.language_id, &snapshot) {
                Ok(Some(root)) => {
                    script.generated = Some(self.index_generated(id, root, index));
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        script = %id,
                        plugin = plugin.name(),
                        "virtual code generation failed: {error:#}"
                    );
                }
            }
        }

        script.snapshot = snapshot;
        self.scripts.insert(id.clone(), script);
    }

    fn index_generated(&mut self, id: &Url, root: VirtualCode, plugin: usize) -> Generated {
        let root = Arc::new(root);
        let mut embedded_code_index = FxHashMap::default();
        let mut path = Vec::new();
        index_codes(&root, &mut path, &mut |code, path| {
            if embedded_code_index
                .insert(code.id.clone(), path.to_vec())
                .is_some()
            {
                warn!(script = %id, code = %code.id, "duplicate virtual code id in one tree");
            }
            self.code_owners.insert(code.snapshot.id(), id.clone());
        });
        Generated {
            root,
            plugin,
            embedded_code_index,
        }
    }

    fn purge_generated(&mut self, generated: &Generated) {
        for code in generated.root.codes() {
            let snapshot_id = code.snapshot.id();
            self.code_owners.remove(&snapshot_id);
            self.maps.remove(&snapshot_id);
            self.linked.remove(&snapshot_id);
        }
    }
}

fn index_codes(
    code: &VirtualCode,
    path: &mut Vec<usize>,
    visit: &mut impl FnMut(&VirtualCode, &[usize]),
) {
    visit(code, path);
    for (index, child) in code.embedded_codes.iter().enumerate() {
        path.push(index);
        index_codes(child, path, visit);
        path.pop();
    }
}
