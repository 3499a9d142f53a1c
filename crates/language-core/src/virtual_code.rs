use weft_source_map::Mapping;

use crate::code_information::CodeInformation;
use crate::linked_code_map::LinkedCodeMapping;
use crate::snapshot::Snapshot;

pub type CodeMapping = Mapping<CodeInformation>;

/// One generated document in a single notation, derived from a source script
/// (or from another virtual code, when nested).
///
/// The tree is plain owned data: children live in `embedded_codes`, and all
/// back-references (owning script, lookup by id) are id-keyed indexes held by
/// the registry. A virtual code is recomputed, never mutated, when its owning
/// script's snapshot changes.
#[derive(Clone, Debug)]
pub struct VirtualCode {
    /// Unique within the owning script's tree.
    pub id: String,
    pub language_id: String,
    pub snapshot: Snapshot,
    /// Mappings back to the originating document(s). Entries with a `source`
    /// target a script other than the owning one.
    pub mappings: Vec<CodeMapping>,
    /// Self-referential mappings connecting aliased regions, empty when the
    /// generator produced none.
    pub linked_code_mappings: Vec<LinkedCodeMapping>,
    pub embedded_codes: Vec<VirtualCode>,
}

impl VirtualCode {
    pub fn new(
        id: impl Into<String>,
        language_id: impl Into<String>,
        snapshot: Snapshot,
        mappings: Vec<CodeMapping>,
    ) -> Self {
        Self {
            id: id.into(),
            language_id: language_id.into(),
            snapshot,
            mappings,
            linked_code_mappings: Vec::new(),
            embedded_codes: Vec::new(),
        }
    }

    /// This code and every embedded code beneath it, parents before children.
    pub fn codes(&self) -> impl Iterator<Item = &VirtualCode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let code = stack.pop()?;
            stack.extend(code.embedded_codes.iter().rev());
            Some(code)
        })
    }
}
