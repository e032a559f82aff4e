// src/embeddings/hash.rs
// Deterministic local embedder: hashed character-trigram features

/// Embedding dimension for the hashed feature space.
const DIMENSION: usize = 256;

const MODEL_NAME: &str = "local-hash-trigram-v1";

/// Local fallback embedder. Each text becomes a bag of lowercased word
/// and character-trigram features hashed into a fixed-size vector, then
/// L2-normalized so inner product equals cosine similarity. No network,
/// no model weights, stable across runs.
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: DIMENSION,
        }
    }
}

impl HashEmbedder {
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &'static str {
        MODEL_NAME
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for word in tokenize(text) {
            bump(&mut vector, &word);
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                bump(&mut vector, &trigram);
            }
        }
        normalize(&mut vector);
        vector
    }

    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn bump(vector: &mut [f32], feature: &str) {
    let slot = (fnv1a(feature.as_bytes()) as usize) % vector.len();
    vector[slot] += 1.0;
}

/// FNV-1a, fixed here so vectors stay comparable across builds.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
