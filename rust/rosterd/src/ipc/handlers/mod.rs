pub mod core;
pub mod courses;
pub mod records;
pub mod reports;
pub mod students;
