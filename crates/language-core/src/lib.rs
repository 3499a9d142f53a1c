//! Core data model of the virtual-document engine: content snapshots with
//! stable identity, capability-tagged virtual-code trees, the generator
//! plugin contract, and the registry that keeps generated trees and their
//! derived source maps in sync with document edits.

mod code_information;
mod linked_code_map;
mod plugin;
mod registry;
mod snapshot;
mod virtual_code;

pub use code_information::{
    CodeInformation, Completion, Navigation, Predicate, Semantic, TextResolver, Verification,
};
pub use linked_code_map::{LinkedCodeCapabilities, LinkedCodeMap, LinkedCodeMapping};
pub use plugin::LanguagePlugin;
pub use registry::{Generated, ScriptMaps, ScriptRegistry, SourceScript, SyncHook, VirtualCodeRef};
pub use snapshot::{Snapshot, SnapshotId};
pub use virtual_code::{CodeMapping, VirtualCode};

pub use weft_source_map::{Mapping, SourceMap};
