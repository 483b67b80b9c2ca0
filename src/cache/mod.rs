pub mod lookups;
pub mod users;
