pub mod connection;
pub mod indexes;
pub mod queries;
pub mod tip_store;
