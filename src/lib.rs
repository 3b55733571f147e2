pub mod cli;
pub mod config;
pub mod monitor;
pub mod shutdown;
pub mod utils;

pub use utils::AppError;
