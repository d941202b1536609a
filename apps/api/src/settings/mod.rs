pub mod api_keys;
pub mod handlers;
pub mod store;
