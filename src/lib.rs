pub mod auth;
pub mod config;
pub mod engine;
pub mod extractor;
pub mod ledger;
pub mod registry;
pub mod store;

// Re-export signature types for convenience
pub use facegate_signature::{
    ExtractError, RawVectorExtractor, Signature, SignatureError, SignatureExtractor,
    SIGNATURE_BYTES, SIGNATURE_DIM,
};
