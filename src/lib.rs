//! Schema and data access for the `users` table of the `PayPal` database.

pub mod config;
pub mod db;
pub mod state;
pub mod users;
