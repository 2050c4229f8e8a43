pub mod action;
pub mod body;
pub mod error;
pub mod program;
pub mod state;
pub mod types;
pub mod value;

pub use action::*;
pub use body::*;
pub use error::{Diagnostic, ThreadScriptError};
pub use program::*;
pub use state::*;
pub use types::*;
pub use value::*;
