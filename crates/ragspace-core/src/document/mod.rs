pub mod chunker;
pub mod extractor;
pub mod structured_chunker;

pub use chunker::{SimpleTextChunker, TextChunker};
pub use extractor::DocumentTextExtractor;
pub use structured_chunker::StructuredTextChunker;
