pub mod extraction;
pub mod handlers;
pub mod prompts;
pub mod store;
