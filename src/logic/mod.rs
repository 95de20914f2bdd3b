pub mod blobs;
pub mod chunker;
pub mod documents;
pub mod merge;
pub mod resource;
pub mod timestamps;

pub use blobs::{BufferedSource, ChunkSource};
pub use chunker::ChunkBuffer;
pub use documents::Collection;
pub use merge::{FieldValue, MergePatch, SetInstruction};
pub use resource::Resource;
pub use timestamps::parse_timestamps;
