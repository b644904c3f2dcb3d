pub mod auth;
pub mod cart;
pub mod checkin;
pub mod config;
pub mod handlers;
pub mod models;
pub mod orders;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
