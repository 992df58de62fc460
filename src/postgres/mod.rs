// ABOUTME: PostgreSQL connection utilities
// ABOUTME: Exports connect and the process-wide TLS policy

pub mod connection;

pub use connection::{connect, init_tls_policy};
