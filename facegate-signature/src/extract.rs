use thiserror::Error;

use crate::signature::{Signature, SignatureError};

/// Why a probe image could not be turned into a signature.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("no face detected in the probe image")]
    NoFaceDetected,
    #[error("more than one face detected in the probe image")]
    MultipleFacesDetected,
    #[error("signature extraction failed: {0}")]
    Failed(String),
}

/// Turns a captured probe image into a face signature.
///
/// The engine only depends on this trait; the actual model can live in
/// another process, another service, or a test double.
pub trait SignatureExtractor: Send + Sync {
    fn extract(&self, image: &[u8]) -> Result<Signature, ExtractError>;
}

/// Extractor for pre-encoded probes: the input bytes are already a
/// signature in storage form. Used when embeddings are computed upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawVectorExtractor;

impl SignatureExtractor for RawVectorExtractor {
    fn extract(&self, image: &[u8]) -> Result<Signature, ExtractError> {
        Signature::from_bytes(image).map_err(|e| match e {
            SignatureError::MalformedSignature { len } => {
                ExtractError::Failed(format!("raw probe is {len} bytes, not a signature"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SIGNATURE_DIM;

    #[test]
    fn raw_extractor_accepts_encoded_signatures() {
        let sig = Signature::from_vec(vec![0.25; SIGNATURE_DIM]).unwrap();
        let out = RawVectorExtractor.extract(&sig.to_bytes()).unwrap();
        assert_eq!(out, sig);
    }

    #[test]
    fn raw_extractor_rejects_other_payloads() {
        let err = RawVectorExtractor.extract(b"not a signature").unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }
}
