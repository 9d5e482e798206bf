pub mod auth;
pub mod cli;
pub mod config;
pub mod controller;
pub mod database;
pub mod entity;
pub mod error;
pub mod filter;
pub mod graphql;
pub mod handlers;
pub mod middleware;
pub mod permission;
pub mod server;
pub mod services;
pub mod session;
pub mod state;
pub mod types;
