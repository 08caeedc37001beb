//! Error taxonomy shared by every relay crate

mod client_error;

pub use client_error::{ApiErrorBody, ClientError, ClientResult};
