pub mod events;
pub mod manager;
pub mod registry;
