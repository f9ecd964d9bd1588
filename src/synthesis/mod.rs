//! Text-synthesis port adapters.

mod client;

pub use client::{HttpSynthesisClient, SynthesisClientConfig};
