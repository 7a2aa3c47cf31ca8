pub mod models;
pub mod todo;
pub mod window;
