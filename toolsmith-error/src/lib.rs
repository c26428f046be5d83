//! # toolsmith-error
//!
//! One error type for every toolsmith crate.
//!
//! - `ErrorKind` says what failed. Tool kinds are turned into tool results,
//!   completion kinds abandon the current turn.
//! - `message()` is the text a model sees for a tool failure.
//! - Operation and context are for logs; `set_source` keeps the cause.
//!
//! ```rust
//! use toolsmith_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ToolNotFound, "Tool 'fetch' not found.")
//!         .with_operation("executor::invoke")
//!         .with_context("tool", "fetch"))
//! }
//! ```

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;
