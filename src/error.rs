//! Error types surfaced at the widget boundary.
//!
//! Loader internals work with `anyhow::Result` and only get wrapped into a
//! [`LoadFailure`] once the result reaches the load coordinator. Attribute
//! parse errors never leave the configuration layer: they are logged and the
//! documented default is used instead.

use thiserror::Error;

use crate::loading::RequestId;

/// A model could not be fetched or decoded.
///
/// Carried by the `model-error` event. The widget stays usable afterwards and
/// a new `model-url` may be set at any time; nothing is retried automatically.
#[derive(Error, Debug)]
#[error("failed to load model from `{url}`")]
pub struct LoadFailure {
    pub url: String,
    pub request: RequestId,
    #[source]
    pub cause: anyhow::Error,
}

/// Reasons an attribute value was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    #[error("`{value}` is not a valid number for `{name}`")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{value} is out of range for `{name}`")]
    OutOfRange { name: &'static str, value: f32 },

    #[error("`{0}` is not a recognised colour")]
    InvalidColour(String),
}
