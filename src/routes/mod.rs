pub mod chat;
pub mod generate;
pub mod health;
pub mod user;
