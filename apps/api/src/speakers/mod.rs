pub mod context;
pub mod enrichment;
pub mod handlers;
pub mod listing;
pub mod lock;
pub mod profiles;
pub mod prompts;
pub mod resolver;
pub mod validation;
pub mod web_search;
