//! # relay-rest
//!
//! REST client with per-bucket and global rate limiting.

pub mod bucket;
pub mod client;
pub mod error;
pub mod global;
pub mod headers;
pub mod route;

pub use bucket::{BucketSnapshot, BucketStore, Reservation};
pub use client::{
    GatewayBot, RateLimitNotice, RateLimitObserver, RestClient, RestConfig, RestResponse,
};
pub use error::RestError;
pub use global::GlobalLimiter;
pub use headers::{RateLimitHeaders, RateLimitScope};
pub use route::Route;

pub use reqwest::Method;
