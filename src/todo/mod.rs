// Public API - what other modules can use
pub use models::{TodoModel, TodoPriority, TodoStatus};
pub use repository::TodoRepository;

pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
