pub mod config;
pub mod error;
pub mod path;
pub mod state;
pub mod types;
pub mod value;

pub use config::*;
pub use error::{ErrorKind, ScribeError};
pub use state::*;
pub use types::*;
pub use value::*;
