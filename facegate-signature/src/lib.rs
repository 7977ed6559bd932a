pub mod extract;
pub mod signature;

// Re-export commonly used types
pub use extract::{ExtractError, RawVectorExtractor, SignatureExtractor};
pub use signature::{Signature, SignatureError, SIGNATURE_BYTES, SIGNATURE_DIM};
