//! Market data API client module
//!
//! Provides async methods to fetch daily bars over HTTP.

mod error;
mod yahoo;

pub use error::{ApiError, ApiResult};
pub use yahoo::{parse_chart_response, YahooClient};
