pub mod timestamp;
pub mod todo;
