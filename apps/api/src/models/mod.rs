pub mod briefing;
pub mod company;
pub mod entity;
pub mod speaker;
pub mod team;
pub mod transcript;
pub mod user;
