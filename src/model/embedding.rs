use rig::embeddings::Embedding;

/// Conversions between rig embeddings and the little-endian f32 blobs
/// stored in `F32_BLOB` columns
pub trait EmbeddingConversion {
    fn to_vec(&self) -> Vec<f32>;
    fn from_vec(vec: Vec<f32>) -> Self;
    fn to_binary(&self) -> Vec<u8>;
    fn from_binary(binary: &[u8]) -> Self;
}

impl EmbeddingConversion for Embedding {
    fn to_vec(&self) -> Vec<f32> {
        self.vec.iter().map(|f| *f as f32).collect()
    }

    fn from_vec(vec: Vec<f32>) -> Self {
        Self {
            vec: vec.into_iter().map(f64::from).collect(),
            document: String::new(),
        }
    }

    fn to_binary(&self) -> Vec<u8> {
        f32_blob(&self.vec)
    }

    fn from_binary(binary: &[u8]) -> Self {
        let vec = binary
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::from_vec(vec)
    }
}

/// Encode a vector as a little-endian f32 blob
pub fn f32_blob(vec: &[f64]) -> Vec<u8> {
    vec.iter().flat_map(|f| (*f as f32).to_le_bytes()).collect()
}
