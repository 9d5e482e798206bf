// handlers/public/mod.rs - Public handlers (no session required)
//
// Route Prefix: no /api prefix (/auth/*)
// Middleware: none; every input is untrusted

pub mod auth;
