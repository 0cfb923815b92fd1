//! Directory grant types and provider error classification.
//!
//! `grant` names the token endpoint grants each flow speaks. `strategy` defines
//! [`ProviderStrategy`], the HTTP-client-agnostic hook that maps OAuth error payloads onto the
//! crate's error taxonomy. Flows themselves form a closed set; the strategy only classifies.

pub mod grant;
pub mod strategy;

pub use grant::*;
pub use strategy::*;
