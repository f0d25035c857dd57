pub mod client;
pub mod request;

pub use client::{HttpTransport, RawPayload, Transport};
pub use request::ProviderRequest;
