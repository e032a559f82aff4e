// src/index/mod.rs
// Vector index structures: flat exhaustive and partitioned (coarse quantizer)

mod hybrid;
mod manager;
mod text;

pub use hybrid::{HybridHit, QueryTerms, api_terms_for_kind, extract_query_terms, merge_hybrid};
pub use manager::{
    BuildOutcome, BuildReport, BrowseEntry, BrowsePage, DEFAULT_BUILD_LIMIT, EmbeddingManager,
    IndexStats, IndexStatus, KindStats, SearchHit,
};
pub use text::serialize_record;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Row count at which a build auto-selects the partitioned layout.
pub const PARTITION_AUTO_THRESHOLD: usize = 10_000;

/// K-means rounds for coarse-quantizer training.
const TRAIN_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAlgorithm {
    /// Exhaustive inner-product scan; the correctness baseline
    Flat,
    /// Coarse-quantizer search over k-means partitions
    Partitioned,
}

impl IndexAlgorithm {
    pub fn parse(s: &str) -> Option<IndexAlgorithm> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Some(IndexAlgorithm::Flat),
            "partitioned" => Some(IndexAlgorithm::Partitioned),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexAlgorithm::Flat => "flat",
            IndexAlgorithm::Partitioned => "partitioned",
        }
    }
}

/// Immutable nearest-neighbour index over L2-normalized vectors stored in
/// one contiguous row-major matrix. Inner product on normalized rows is
/// cosine similarity, so scores land in [-1, 1].
pub struct VectorIndex {
    dimension: usize,
    algorithm: IndexAlgorithm,
    data: Vec<f32>,
    rows: usize,
    centroids: Vec<f32>,
    lists: Vec<Vec<usize>>,
}

impl VectorIndex {
    /// Build from row vectors. Rows are normalized on insertion; the
    /// partitioned quantizer is trained once, here.
    pub fn build(vectors: Vec<Vec<f32>>, dimension: usize, algorithm: IndexAlgorithm) -> Self {
        let rows = vectors.len();
        let mut data = Vec::with_capacity(rows * dimension);
        for mut vector in vectors {
            vector.resize(dimension, 0.0);
            normalize(&mut vector);
            data.extend_from_slice(&vector);
        }

        let mut index = Self {
            dimension,
            algorithm,
            data,
            rows,
            centroids: Vec::new(),
            lists: Vec::new(),
        };
        if algorithm == IndexAlgorithm::Partitioned && rows > 0 {
            index.train_partitions();
        }
        index
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn algorithm(&self) -> IndexAlgorithm {
        self.algorithm
    }

    fn row(&self, position: usize) -> &[f32] {
        &self.data[position * self.dimension..(position + 1) * self.dimension]
    }

    /// Top-k positions by similarity, descending.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.rows == 0 || k == 0 {
            return Vec::new();
        }
        let mut query = query.to_vec();
        query.resize(self.dimension, 0.0);
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = match self.algorithm {
            IndexAlgorithm::Flat => (0..self.rows)
                .map(|position| (position, dot(self.row(position), &query)))
                .collect(),
            IndexAlgorithm::Partitioned => self.probe_partitions(&query),
        };

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn probe_partitions(&self, query: &[f32]) -> Vec<(usize, f32)> {
        if self.centroids.is_empty() {
            // Untrained partitions degrade to a flat scan
            return (0..self.rows)
                .map(|position| (position, dot(self.row(position), query)))
                .collect();
        }
        let nlist = self.lists.len();
        let nprobe = (nlist / 8).max(1);

        let mut by_centroid: Vec<(usize, f32)> = (0..nlist)
            .map(|c| {
                let centroid = &self.centroids[c * self.dimension..(c + 1) * self.dimension];
                (c, dot(centroid, query))
            })
            .collect();
        by_centroid.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        by_centroid
            .into_iter()
            .take(nprobe)
            .flat_map(|(c, _)| self.lists[c].iter().copied())
            .map(|position| (position, dot(self.row(position), query)))
            .collect()
    }

    /// Lloyd's k-means with a fixed seed, nlist ≈ √N.
    fn train_partitions(&mut self) {
        let nlist = ((self.rows as f64).sqrt().ceil() as usize).clamp(1, 256).min(self.rows);
        let mut rng = StdRng::seed_from_u64(0x48_75_62_53);

        let seeds = rand::seq::index::sample(&mut rng, self.rows, nlist);
        let mut centroids: Vec<f32> = Vec::with_capacity(nlist * self.dimension);
        for seed in seeds.iter() {
            centroids.extend_from_slice(self.row(seed));
        }

        let mut assignment = vec![0usize; self.rows];
        for _ in 0..TRAIN_ITERATIONS {
            // assign
            for position in 0..self.rows {
                let row = self.row(position);
                let mut best = (0usize, f32::MIN);
                for c in 0..nlist {
                    let centroid = &centroids[c * self.dimension..(c + 1) * self.dimension];
                    let score = dot(centroid, row);
                    if score > best.1 {
                        best = (c, score);
                    }
                }
                assignment[position] = best.0;
            }
            // update
            let mut sums = vec![0f32; nlist * self.dimension];
            let mut counts = vec![0usize; nlist];
            for position in 0..self.rows {
                let c = assignment[position];
                counts[c] += 1;
                let row = self.row(position);
                for (d, value) in row.iter().enumerate() {
                    sums[c * self.dimension + d] += value;
                }
            }
            for c in 0..nlist {
                if counts[c] == 0 {
                    continue;
                }
                let slice = &mut sums[c * self.dimension..(c + 1) * self.dimension];
                normalize(slice);
                centroids[c * self.dimension..(c + 1) * self.dimension].copy_from_slice(slice);
            }
        }

        let mut lists = vec![Vec::new(); nlist];
        for (position, c) in assignment.iter().enumerate() {
            lists[*c].push(position);
        }
        self.centroids = centroids;
        self.lists = lists;
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
