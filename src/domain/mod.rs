pub mod error;
pub mod models;
pub mod sample_store;
pub mod settings;
