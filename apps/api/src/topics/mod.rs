pub mod grouping;
pub mod handlers;
