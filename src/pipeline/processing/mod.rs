// Pipeline processing: classification, normalization, consolidation and the
// downstream validate/enrich/aggregate transform

pub mod aggregate;
pub mod classifier;
pub mod columns;
pub mod consolidate;
pub mod decode;
pub mod enrich;
pub mod normalize;
pub mod registry;
pub mod spreadsheet;
pub mod table;
pub mod validate;

pub use classifier::{Classification, FormatClassifier, MatchPass};
pub use consolidate::{consolidate, ConsolidationStats};
pub use decode::TextDecoder;
pub use normalize::{Layout, RecordNormalizer};
pub use registry::Registry;
