pub mod admin;
pub mod auth;
pub mod cookies;
pub mod health;
pub mod me;
