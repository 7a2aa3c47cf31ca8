pub mod bootstrap;
pub mod oauth;
pub mod repl;
pub mod todo_service;
