// Inverted-file flat index over L2 distance. A k-means quantizer trained
// on the full vector set partitions vectors into `nlist` inverted lists;
// search only scans the lists whose centroids are nearest to the query.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{FloatError, Result};

const KMEANS_MAX_ITERATIONS: usize = 25;

/// Clustering factor for a corpus of the given size: one partition per ten
/// documents, at least one, capped at 100 so large corpora stay bounded.
#[inline]
pub fn clustering_factor(document_count: usize) -> usize {
    (document_count / 10).clamp(1, 100)
}

/// IVF-Flat index. Vector slots are assigned in exact add order; distances
/// are squared L2, smaller is nearer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfFlatIndex {
    dimension: usize,
    centroids: Vec<Vec<f32>>,
    /// One inverted list per centroid, holding vector slots.
    lists: Vec<Vec<usize>>,
    /// Flat vector storage; position is the slot.
    vectors: Vec<Vec<f32>>,
}

impl IvfFlatIndex {
    /// Train the quantizer on the full vector set, seeding `nlist` cluster
    /// centroids. The index starts empty; vectors are added afterwards.
    #[inline]
    pub fn train(training: &[Vec<f32>], nlist: usize, seed: u64) -> Result<Self> {
        if training.is_empty() {
            return Err(FloatError::Ingestion(
                "cannot train an index on an empty vector set".to_string(),
            ));
        }

        let dimension = training[0].len();
        for vector in training {
            if vector.len() != dimension {
                return Err(FloatError::Ingestion(format!(
                    "training vector dimension mismatch: expected {dimension}, got {}",
                    vector.len()
                )));
            }
        }

        let nlist = nlist.clamp(1, training.len());
        let centroids = kmeans(training, nlist, dimension, seed);
        let list_count = centroids.len();

        info!(
            "Trained IVF quantizer: {} centroids over {} training vectors, dimension {}",
            list_count,
            training.len(),
            dimension
        );

        Ok(Self {
            dimension,
            centroids,
            lists: vec![Vec::new(); list_count],
            vectors: Vec::new(),
        })
    }

    /// Add one vector, returning the slot it was assigned. Slots increase
    /// monotonically in add order.
    #[inline]
    pub fn add(&mut self, vector: Vec<f32>) -> Result<usize> {
        if vector.len() != self.dimension {
            return Err(FloatError::Ingestion(format!(
                "vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        let slot = self.vectors.len();
        let list = nearest_centroid(&self.centroids, &vector);
        self.lists[list].push(slot);
        self.vectors.push(vector);
        Ok(slot)
    }

    /// Search the `nprobe` nearest partitions for the `k` nearest vectors.
    /// Returns `(slot, squared L2 distance)` pairs, nearest first; ties
    /// break on slot order so results are reproducible.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(FloatError::Retrieval(format!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, squared_l2(query, c)))
            .collect();
        ranked.sort_by(|a, b| compare_distance(a.1, b.1).then(a.0.cmp(&b.0)));

        // A k that covers the whole corpus must see every list, not just
        // the nprobe nearest ones
        let nprobe = if k >= self.vectors.len() {
            self.centroids.len()
        } else {
            nprobe.clamp(1, self.centroids.len())
        };
        let mut candidates: Vec<(usize, f32)> = Vec::new();
        for &(list, _) in ranked.iter().take(nprobe) {
            for &slot in &self.lists[list] {
                candidates.push((slot, squared_l2(query, &self.vectors[slot])));
            }
        }

        candidates.sort_by(|a, b| compare_distance(a.1, b.1).then(a.0.cmp(&b.0)));
        candidates.truncate(k);

        debug!(
            "IVF search probed {}/{} lists, {} candidates",
            nprobe,
            self.centroids.len(),
            candidates.len()
        );

        Ok(candidates)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn nlist(&self) -> usize {
        self.centroids.len()
    }
}

fn compare_distance(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_l2(vector, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Lloyd's k-means over the training set with a seeded RNG so builds are
/// reproducible. Empty clusters are re-seeded from a random training point.
fn kmeans(data: &[Vec<f32>], k: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centroids: Vec<Vec<f32>> = sample(&mut rng, data.len(), k)
        .into_iter()
        .map(|i| data[i].clone())
        .collect();

    let mut assignments = vec![usize::MAX; data.len()];

    for iteration in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (i, vector) in data.iter().enumerate() {
            let nearest = nearest_centroid(&centroids, vector);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        if !changed && iteration > 0 {
            debug!("k-means converged after {} iterations", iteration);
            break;
        }

        let mut sums = vec![vec![0.0f32; dimension]; k];
        let mut counts = vec![0usize; k];
        for (vector, &cluster) in data.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (acc, value) in sums[cluster].iter_mut().zip(vector.iter()) {
                *acc += value;
            }
        }

        for (cluster, (sum, &count)) in sums.iter().zip(counts.iter()).enumerate() {
            if count == 0 {
                let replacement = sample(&mut rng, data.len(), 1).index(0);
                centroids[cluster] = data[replacement].clone();
            } else {
                for (c, s) in centroids[cluster].iter_mut().zip(sum.iter()) {
                    *c = s / count as f32;
                }
            }
        }
    }

    centroids
}
