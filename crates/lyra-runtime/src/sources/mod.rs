//! External data sources.
//!
//! Thin clients over the [`ResilientFetcher`](crate::http::ResilientFetcher).
//! They decode bodies and map "not found" to `None`; deciding whether that
//! is a stage failure is left to the stages.

mod alphafold;
mod uniprot;

pub use alphafold::AlphaFoldClient;
pub use uniprot::UniProtClient;
