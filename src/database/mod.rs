//! PostgreSQL pool construction and embedded schema migrations.

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::DatabaseMigrations;
