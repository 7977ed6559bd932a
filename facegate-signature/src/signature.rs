use ndarray::Array1;
use thiserror::Error;

/// Dimensionality of a face signature (ArcFace-style embedding).
pub const SIGNATURE_DIM: usize = 512;

/// Encoded size of one signature: 512 little chunks of 4 bytes each.
pub const SIGNATURE_BYTES: usize = SIGNATURE_DIM * 4;

#[derive(Debug, Error)]
pub enum SignatureError {
    /// The byte blob cannot be a 512-d f32 vector.
    #[error("malformed signature: {len} bytes, expected {}", SIGNATURE_BYTES)]
    MalformedSignature { len: usize },
}

/// Fixed-length face signature produced by the extraction model.
///
/// The vector is stored exactly as extracted; normalization happens inside
/// [`Signature::similarity`] so encoding and decoding stay lossless.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    vector: Array1<f32>,
}

impl Signature {
    pub fn from_vec(values: Vec<f32>) -> Result<Self, SignatureError> {
        if values.len() != SIGNATURE_DIM {
            return Err(SignatureError::MalformedSignature {
                len: values.len() * 4,
            });
        }
        Ok(Self {
            vector: Array1::from_vec(values),
        })
    }

    /// Decode a signature previously produced by [`Signature::to_bytes`].
    ///
    /// Anything that is not exactly 2048 bytes is rejected; a partial or
    /// padded blob means the stored record is corrupt.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_BYTES {
            return Err(SignatureError::MalformedSignature { len: bytes.len() });
        }
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(bytes);
        Ok(Self {
            vector: Array1::from_vec(values),
        })
    }

    /// Encode to the storage form: 512 f32 components, native byte order,
    /// no header. Decoding gives back the identical vector bit for bit.
    pub fn to_bytes(&self) -> Vec<u8> {
        let values = self.vector.to_vec();
        bytemuck::cast_slice(&values).to_vec()
    }

    pub fn as_array(&self) -> &Array1<f32> {
        &self.vector
    }

    /// Cosine similarity against another signature, in [-1.0, 1.0].
    ///
    /// Both vectors are L2-normalized independently before the dot product,
    /// so callers may hand in raw or pre-normalized vectors interchangeably.
    /// A zero vector has no direction and scores 0.0 against everything.
    pub fn similarity(&self, other: &Signature) -> f64 {
        let a = unit(&self.vector);
        let b = unit(&other.vector);
        a.dot(&b).clamp(-1.0, 1.0)
    }
}

/// Widen to f64 and scale to unit length. Zero vectors pass through.
fn unit(v: &Array1<f32>) -> Array1<f64> {
    let wide = v.mapv(f64::from);
    let norm = wide.dot(&wide).sqrt();
    if norm > 0.0 {
        wide / norm
    } else {
        wide
    }
}
