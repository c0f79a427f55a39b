//! Print-on-demand fulfillment providers.

pub mod printful;

pub use printful::PrintfulClient;
