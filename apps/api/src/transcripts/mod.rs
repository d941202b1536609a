pub mod analysis;
pub mod bulk;
pub mod content;
pub mod handlers;
pub mod ingest;
pub mod prompts;
pub mod segments;
pub mod store;
