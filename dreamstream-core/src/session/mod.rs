pub mod actor;
pub mod role;
