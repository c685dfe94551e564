// Expense Session - session and API client library for the expense tracker

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod utils;
