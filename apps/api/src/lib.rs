//! Meeting intelligence service: transcript ingestion, speaker identity and
//! enrichment, search and daily briefings.

pub mod auth;
pub mod blob;
pub mod briefings;
pub mod companies;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod routes;
pub mod search;
pub mod settings;
pub mod speakers;
pub mod state;
pub mod teams;
pub mod topics;
pub mod transcripts;
