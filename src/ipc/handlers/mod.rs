pub mod core;
pub mod courses;
pub mod imports;
pub mod projects;
pub mod setup;
pub mod users;
