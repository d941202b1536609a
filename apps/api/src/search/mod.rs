pub mod chunking;
pub mod embeddings;
pub mod handlers;
pub mod indexing;
pub mod vectors;
