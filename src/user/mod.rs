// Public API - what other modules can use
pub use models::{User, UserResponse};
pub use repository::UserRepository;

pub mod models;
pub mod repository;
