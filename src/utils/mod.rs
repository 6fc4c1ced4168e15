//! The `utils` module collects the pieces shared by every other module:
//! the error types and the logging bootstrap.

pub mod error;
pub mod logging;

pub use error::{ClientError, TransportError};
