// containersync-common: shared types, key spaces and the sync storage schema.

pub mod keys;
pub mod schema;
pub mod types;
