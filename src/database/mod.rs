/// Pool management and migrations
pub mod connection;
/// Row types and their queries
pub mod models;
