//! The ONES platform: OpenAPI client, wire types, and the event webhook.

pub(crate) mod client;
pub(crate) mod issue;
mod webhook;

pub use client::{OnesClient, OpenApi, OpenApiError};
pub use issue::*;
pub use webhook::event::*;
pub use webhook::{deserialize_payload, webhook};
