pub mod config;
pub mod errors;
pub mod output;
pub mod paths;

pub use config::*;
pub use errors::*;
pub use output::*;
pub use paths::*;
