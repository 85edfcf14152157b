pub mod error;
pub mod integration;
pub mod message;
pub mod notification;
pub mod path;
pub mod state;
pub mod thread;
pub mod user;

pub use error::Error;
pub use state::AppState;

pub type Result<T> = std::result::Result<T, Error>;
