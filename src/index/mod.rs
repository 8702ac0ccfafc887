// The persisted index: an IVF-Flat ANN structure, a docstore mapping
// opaque ids to Documents, and a slot-map linking vector slots to those
// ids. The three pieces are written and loaded as one atomic bundle.

pub mod ivf;


use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ingest::Document;
use crate::{FloatError, Result};

pub use ivf::{IvfFlatIndex, clustering_factor};

const ANN_FILE: &str = "ann.bin";
const DOCSTORE_FILE: &str = "docstore.json";
const SLOT_MAP_FILE: &str = "slot_map.json";
const METADATA_FILE: &str = "metadata.json";

/// Fixed quantizer seed so repeated builds of the same corpus produce the
/// same partitioning.
const BUILD_SEED: u64 = 0x464c_4f41;

/// Bundle metadata, validated at load time and again at query time so a
/// model switch between ingestion and querying fails fast instead of
/// silently degrading relevance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub model: String,
    pub dimension: usize,
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
}

/// One retrieval hit: the resolved Document and its squared L2 distance
/// from the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub distance: f32,
}

pub struct VectorIndex {
    ann: IvfFlatIndex,
    docstore: HashMap<String, Document>,
    /// Position is the vector slot, in exact add order.
    slot_map: Vec<String>,
    metadata: IndexMetadata,
}

impl VectorIndex {
    /// Build a complete index from matching Document and vector sequences.
    /// The sequences must be the same length and in the same order; any
    /// mismatch is a fatal ingestion error.
    #[inline]
    pub fn build(
        documents: Vec<Document>,
        vectors: Vec<Vec<f32>>,
        model: &str,
        dimension: usize,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(FloatError::Ingestion(
                "cannot build an index from an empty corpus".to_string(),
            ));
        }

        if documents.len() != vectors.len() {
            return Err(FloatError::Ingestion(format!(
                "document/vector count mismatch: {} documents, {} vectors",
                documents.len(),
                vectors.len()
            )));
        }

        let nlist = clustering_factor(documents.len());
        let mut ann = IvfFlatIndex::train(&vectors, nlist, BUILD_SEED)?;
        if ann.dimension() != dimension {
            return Err(FloatError::Ingestion(format!(
                "embedding dimension mismatch: expected {dimension}, got {}",
                ann.dimension()
            )));
        }

        for vector in vectors {
            ann.add(vector)?;
        }

        // Opaque ids keep storage identity separate from row_index; the
        // slot-map records them in the exact order vectors were added.
        let mut docstore = HashMap::with_capacity(documents.len());
        let mut slot_map = Vec::with_capacity(documents.len());
        let document_count = documents.len();
        for document in documents {
            let id = Uuid::new_v4().to_string();
            docstore.insert(id.clone(), document);
            slot_map.push(id);
        }

        let metadata = IndexMetadata {
            model: model.to_string(),
            dimension,
            document_count,
            created_at: Utc::now(),
        };

        info!(
            "Built index: {} documents, {} partitions, dimension {}",
            document_count,
            ann.nlist(),
            dimension
        );

        Ok(Self {
            ann,
            docstore,
            slot_map,
            metadata,
        })
    }

    /// Search for the `k` nearest documents to the query vector. When the
    /// corpus holds fewer than `k` documents all of them are returned.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Result<Vec<ScoredDocument>> {
        let hits = self.ann.search(query, k, nprobe)?;

        let mut results = Vec::with_capacity(hits.len());
        for (slot, distance) in hits {
            let id = self.slot_map.get(slot).ok_or_else(|| {
                FloatError::Retrieval(format!("vector slot {slot} missing from slot-map"))
            })?;
            let document = self.docstore.get(id).ok_or_else(|| {
                FloatError::Retrieval(format!("docstore id {id} missing for slot {slot}"))
            })?;
            results.push(ScoredDocument {
                document: document.clone(),
                distance,
            });
        }

        Ok(results)
    }

    /// Persist the bundle atomically: everything is written to a staging
    /// directory first, then swapped into place, so a failed save never
    /// corrupts a previously-saved index. The raw ANN structure is also
    /// written standalone to `raw_path` for recovery and inspection.
    #[inline]
    pub fn save(&self, bundle_dir: &Path, raw_path: &Path) -> Result<()> {
        let staging = bundle_dir.with_extension("staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let ann_file = BufWriter::new(File::create(staging.join(ANN_FILE))?);
        bincode::serialize_into(ann_file, &self.ann).map_err(|e| {
            FloatError::Ingestion(format!("failed to serialize ANN structure: {e}"))
        })?;

        let docstore_file = BufWriter::new(File::create(staging.join(DOCSTORE_FILE))?);
        serde_json::to_writer(docstore_file, &self.docstore)
            .map_err(|e| FloatError::Ingestion(format!("failed to serialize docstore: {e}")))?;

        let slot_map_file = BufWriter::new(File::create(staging.join(SLOT_MAP_FILE))?);
        serde_json::to_writer(slot_map_file, &self.slot_map)
            .map_err(|e| FloatError::Ingestion(format!("failed to serialize slot-map: {e}")))?;

        let metadata_file = BufWriter::new(File::create(staging.join(METADATA_FILE))?);
        serde_json::to_writer_pretty(metadata_file, &self.metadata)
            .map_err(|e| FloatError::Ingestion(format!("failed to serialize metadata: {e}")))?;

        swap_into_place(&staging, bundle_dir)?;
        info!("Saved index bundle to {}", bundle_dir.display());

        // The standalone copy is advisory; a failure here is reported but
        // does not invalidate the bundle that was just swapped in.
        if let Err(e) = self.save_raw(raw_path) {
            warn!(
                "Failed to write standalone ANN file {}: {e}",
                raw_path.display()
            );
        }

        Ok(())
    }

    fn save_raw(&self, raw_path: &Path) -> Result<()> {
        let tmp = raw_path.with_extension("ivf.tmp");
        let raw_file = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(raw_file, &self.ann).map_err(|e| {
            FloatError::Ingestion(format!("failed to serialize ANN structure: {e}"))
        })?;
        fs::rename(&tmp, raw_path)?;
        debug!("Wrote standalone ANN file {}", raw_path.display());
        Ok(())
    }

    /// Load a persisted bundle. Missing or inconsistent pieces make the
    /// whole index unavailable; there is no partial recovery.
    #[inline]
    pub fn load(bundle_dir: &Path) -> Result<Self> {
        if !bundle_dir.is_dir() {
            return Err(FloatError::IndexUnavailable(format!(
                "index bundle not found at {} (run `floatchat ingest` first)",
                bundle_dir.display()
            )));
        }

        let metadata: IndexMetadata =
            read_json(&bundle_dir.join(METADATA_FILE), "bundle metadata")?;

        let ann_path = bundle_dir.join(ANN_FILE);
        let ann_file = BufReader::new(File::open(&ann_path).map_err(|e| {
            FloatError::IndexUnavailable(format!("cannot open {}: {e}", ann_path.display()))
        })?);
        let ann: IvfFlatIndex = bincode::deserialize_from(ann_file).map_err(|e| {
            FloatError::IndexUnavailable(format!("corrupt ANN structure: {e}"))
        })?;

        let docstore: HashMap<String, Document> =
            read_json(&bundle_dir.join(DOCSTORE_FILE), "docstore")?;
        let slot_map: Vec<String> = read_json(&bundle_dir.join(SLOT_MAP_FILE), "slot-map")?;

        let index = Self {
            ann,
            docstore,
            slot_map,
            metadata,
        };
        index.validate_invariants()?;

        info!(
            "Loaded index bundle: {} documents, model {}, dimension {}",
            index.metadata.document_count, index.metadata.model, index.metadata.dimension
        );
        Ok(index)
    }

    /// Every slot must resolve through the slot-map into the docstore, and
    /// all counts must agree with the metadata.
    fn validate_invariants(&self) -> Result<()> {
        if self.ann.len() != self.slot_map.len()
            || self.slot_map.len() != self.docstore.len()
            || self.docstore.len() != self.metadata.document_count
        {
            return Err(FloatError::IndexUnavailable(format!(
                "inconsistent bundle: {} vectors, {} slot-map entries, {} documents, metadata says {}",
                self.ann.len(),
                self.slot_map.len(),
                self.docstore.len(),
                self.metadata.document_count
            )));
        }

        if self.ann.dimension() != self.metadata.dimension {
            return Err(FloatError::IndexUnavailable(format!(
                "inconsistent bundle: ANN dimension {} but metadata says {}",
                self.ann.dimension(),
                self.metadata.dimension
            )));
        }

        for id in &self.slot_map {
            if !self.docstore.contains_key(id) {
                return Err(FloatError::IndexUnavailable(format!(
                    "slot-map id {id} does not resolve in the docstore"
                )));
            }
        }

        Ok(())
    }

    /// Reject a query-time model or dimension that differs from the one
    /// the bundle was built with.
    #[inline]
    pub fn validate_model(&self, model: &str, dimension: usize) -> Result<()> {
        if self.metadata.model != model {
            return Err(FloatError::IndexUnavailable(format!(
                "index was built with embedding model '{}' but '{model}' is configured",
                self.metadata.model
            )));
        }
        if self.metadata.dimension != dimension {
            return Err(FloatError::IndexUnavailable(format!(
                "index dimension {} does not match configured dimension {dimension}",
                self.metadata.dimension
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slot_map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slot_map.is_empty()
    }

    #[inline]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = BufReader::new(File::open(path).map_err(|e| {
        FloatError::IndexUnavailable(format!("cannot open {what} at {}: {e}", path.display()))
    })?);
    serde_json::from_reader(file)
        .map_err(|e| FloatError::IndexUnavailable(format!("corrupt {what}: {e}")))
}

/// Replace `target` with `staging`, keeping the old bundle until the new
/// one is fully in place.
fn swap_into_place(staging: &Path, target: &Path) -> Result<()> {
    let backup = target.with_extension("old");
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    if target.exists() {
        fs::rename(target, &backup)?;
    }
    fs::rename(staging, target)?;
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    Ok(())
}
