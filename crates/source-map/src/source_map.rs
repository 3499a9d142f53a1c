use url::Url;

use crate::translate_offset;

/// A set of parallel offset correspondences sharing one capability record.
///
/// Within a single mapping the offset arrays must be sorted ascending and
/// non-overlapping in each coordinate space independently; translation over a
/// mapping that violates this is undefined. Distinct mappings in one
/// [`SourceMap`] may overlap freely.
#[derive(Clone, Debug)]
pub struct Mapping<Data> {
    /// Set when the mapping targets a source document other than the one the
    /// owning generated document was produced from.
    pub source: Option<Url>,
    pub source_offsets: Vec<usize>,
    pub generated_offsets: Vec<usize>,
    pub lengths: Vec<usize>,
    /// Lengths in the generated space, when they differ from `lengths`.
    pub generated_lengths: Option<Vec<usize>>,
    pub data: Data,
}

impl<Data> Mapping<Data> {
    fn generated_lengths(&self) -> &[usize] {
        self.generated_lengths.as_deref().unwrap_or(&self.lengths)
    }
}

/// Queryable index over one generated document's mappings.
///
/// Never mutated after construction; consumers cache instances keyed by the
/// identity of the content snapshot the mappings were derived from.
#[derive(Clone, Debug)]
pub struct SourceMap<Data> {
    mappings: Vec<Mapping<Data>>,
}

impl<Data> SourceMap<Data> {
    pub fn new(mappings: Vec<Mapping<Data>>) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &[Mapping<Data>] {
        &self.mappings
    }

    /// All generated offsets corresponding to `source_offset`, in mapping
    /// list order, restricted to mappings whose data passes `filter`.
    pub fn to_generated_offsets<'a, F>(
        &'a self,
        source_offset: usize,
        filter: F,
    ) -> impl Iterator<Item = (usize, &'a Mapping<Data>)> + 'a
    where
        F: Fn(&Data) -> bool + 'a,
    {
        self.mappings.iter().filter_map(move |mapping| {
            if !filter(&mapping.data) {
                return None;
            }
            translate_offset(
                source_offset,
                &mapping.source_offsets,
                &mapping.generated_offsets,
                &mapping.lengths,
                mapping.generated_lengths(),
            )
            .map(|offset| (offset, mapping))
        })
    }

    /// All source offsets corresponding to `generated_offset`, in mapping
    /// list order, restricted to mappings whose data passes `filter`.
    pub fn to_source_offsets<'a, F>(
        &'a self,
        generated_offset: usize,
        filter: F,
    ) -> impl Iterator<Item = (usize, &'a Mapping<Data>)> + 'a
    where
        F: Fn(&Data) -> bool + 'a,
    {
        self.mappings.iter().filter_map(move |mapping| {
            if !filter(&mapping.data) {
                return None;
            }
            translate_offset(
                generated_offset,
                &mapping.generated_offsets,
                &mapping.source_offsets,
                mapping.generated_lengths(),
                &mapping.lengths,
            )
            .map(|offset| (offset, mapping))
        })
    }

    /// First matching generated offset, if any.
    pub fn to_generated_offset<'a, F>(
        &'a self,
        source_offset: usize,
        filter: F,
    ) -> Option<(usize, &'a Mapping<Data>)>
    where
        F: Fn(&Data) -> bool + 'a,
    {
        self.to_generated_offsets(source_offset, filter).next()
    }

    /// First matching source offset, if any.
    pub fn to_source_offset<'a, F>(
        &'a self,
        generated_offset: usize,
        filter: F,
    ) -> Option<(usize, &'a Mapping<Data>)>
    where
        F: Fn(&Data) -> bool + 'a,
    {
        self.to_source_offsets(generated_offset, filter).next()
    }
}
