pub mod store;
pub mod vacancy;
