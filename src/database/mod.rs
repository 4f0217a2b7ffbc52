pub mod manager;
pub mod models;
pub mod query_builder;
pub mod scoped;

pub use manager::DatabaseManager;
pub use scoped::ScopedRepository;
