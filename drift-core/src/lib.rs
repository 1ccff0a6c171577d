pub mod config;
pub mod prompt;
pub mod route;
pub mod text;
pub mod types;

pub use config::*;
pub use prompt::*;
pub use route::*;
pub use text::*;
pub use types::*;
