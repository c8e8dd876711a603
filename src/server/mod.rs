//! HTTP server for room feeds

pub mod http;

pub use http::{
    error_response, json_response, read_json, run, serve, to_boxed, AppState, BoxBody,
    BoxError,
    MAX_REQUEST_BYTES,
};
