// Node definitions

pub mod postgres;
pub mod postgresdb;

// Re-export the node types
pub use postgres::*;
pub use postgresdb::*;
