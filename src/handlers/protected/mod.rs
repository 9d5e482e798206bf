// handlers/protected/mod.rs - Handlers behind the session middleware
//
// Route Prefix: /api/*
// Middleware: require_session (inserts the Actor extension)

pub mod auth;
pub mod entities;
pub mod files;
