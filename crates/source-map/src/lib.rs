//! Offset mappings between a source document and a document generated from
//! it, plus the bidirectional translation queries the rest of the engine is
//! built on.

mod source_map;
mod translate_offset;

pub use source_map::{Mapping, SourceMap};
pub use translate_offset::translate_offset;
