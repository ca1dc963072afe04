pub mod client;

pub use client::{HttpUpstream, UpstreamClient, UpstreamFailure, endpoint};
