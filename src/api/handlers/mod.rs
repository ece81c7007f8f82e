pub mod auth;
pub mod health;

mod error;

pub use error::{ApiError, ErrorBody};
