use weft_source_map::{Mapping, SourceMap};

/// Which features may follow a linked-code mapping into one of its sides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkedCodeCapabilities {
    pub references: bool,
    pub definitions: bool,
    pub rename: bool,
}

impl LinkedCodeCapabilities {
    pub fn all() -> Self {
        Self {
            references: true,
            definitions: true,
            rename: true,
        }
    }
}

/// A pair of aliased ranges within one document, stored directed (the
/// "source" arrays are one side, the "generated" arrays the other) with one
/// capability record per side.
pub type LinkedCodeMapping = Mapping<(LinkedCodeCapabilities, LinkedCodeCapabilities)>;

/// Answers "which other offsets describe the same logical symbol" within a
/// single document, by treating the linked mapping list once in each
/// direction.
///
/// The relation is symmetric even though it is stored directed. Each yielded
/// offset carries the capability record of the side it lands on, so callers
/// can gate traversal per feature. No cycle detection happens here; callers
/// expanding links recursively maintain their own visited set.
pub struct LinkedCodeMap {
    map: SourceMap<(LinkedCodeCapabilities, LinkedCodeCapabilities)>,
}

impl LinkedCodeMap {
    pub fn new(mappings: Vec<LinkedCodeMapping>) -> Self {
        Self {
            map: SourceMap::new(mappings),
        }
    }

    pub fn linked_offsets(
        &self,
        offset: usize,
    ) -> impl Iterator<Item = (usize, LinkedCodeCapabilities)> + '_ {
        let forward = self
            .map
            .to_generated_offsets(offset, |_| true)
            .map(|(linked, mapping)| (linked, mapping.data.1));
        let backward = self
            .map
            .to_source_offsets(offset, |_| true)
            .map(|(linked, mapping)| (linked, mapping.data.0));
        forward.chain(backward)
    }
}
