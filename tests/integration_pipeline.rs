// End-to-end pipeline: CSV on disk through preprocessing, embedding,
// index build, persistence, retrieval, synthesis, and sanitization,
// with deterministic stand-ins for the two models.

use std::io::Write;
use std::sync::Arc;

use floatchat::config::SanitizerConfig;
use floatchat::embeddings::{Embedder, EmbeddingGenerator};
use floatchat::index::VectorIndex;
use floatchat::ingest::{CsvChunks, Document, preprocess_chunk};
use floatchat::retriever::Retriever;
use floatchat::sanitizer::Sanitizer;
use floatchat::synthesis::{Completer, Synthesizer};
use tempfile::TempDir;

const DIMENSION: usize = 8;

/// Folds text bytes into fixed-size buckets so identical text always
/// maps to an identical vector.
struct BucketEmbedder;

impl Embedder for BucketEmbedder {
    fn embed(&self, texts: &[String]) -> floatchat::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bucket_vector(t)).collect())
    }

    fn model_id(&self) -> &str {
        "bucket-embedder"
    }
}

fn bucket_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMENSION];
    for (i, b) in text.bytes().enumerate() {
        v[i % DIMENSION] += f32::from(b) / 255.0;
    }
    v
}

struct CannedCompleter(&'static str);

impl Completer for CannedCompleter {
    fn complete(&self, _prompt: &str) -> floatchat::Result<String> {
        Ok(self.0.to_string())
    }
}

const CSV_CONTENT: &str = "\
id,depth,pressure,temperature,salinity,station,flag,latitude,longitude,date
0,12.0,1012.9,13.1,34.9,ST-1,ok,-10.0,140.2,2023-03-30
1,10.0,1010.2,14.2,35.1,ST-2,ok,-12.5,-45.2,2023-04-01
2,55.0,1055.7,9.8,34.2,ST-3,ok,33.1,18.4,2023-04-02
";

fn write_csv(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("sensors.csv");
    let mut file = std::fs::File::create(&path).expect("csv file should be creatable");
    file.write_all(CSV_CONTENT.as_bytes())
        .expect("csv content should be writable");
    path
}

fn ingest_documents(csv_path: &std::path::Path) -> Vec<Document> {
    let mut documents = Vec::new();
    let mut next_row_index = 0;
    for chunk in CsvChunks::open(csv_path, 2).expect("csv should open") {
        let rows = chunk.expect("chunk should read cleanly");
        let (chunk_documents, next) = preprocess_chunk(&rows, next_row_index);
        next_row_index = next;
        documents.extend(chunk_documents);
    }
    documents
}

#[test]
fn csv_to_answer_round_trip() {
    let dir = TempDir::new().expect("temp dir should be creatable");
    let csv_path = write_csv(&dir);

    // Preprocess: row indices monotonic across chunk boundaries
    let documents = ingest_documents(&csv_path);
    assert_eq!(documents.len(), 3);
    assert_eq!(
        documents.iter().map(|d| d.row_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        documents[1].text,
        "1 10.0 1010.2 14.2 35.1 ST-2 ok -12.5 -45.2 2023-04-01"
    );

    // Embed with the deterministic stand-in
    let embedder = BucketEmbedder;
    let generator = EmbeddingGenerator::new(&embedder, 2, DIMENSION);
    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let vectors = generator
        .generate(&texts, None)
        .expect("embedding should succeed");
    assert_eq!(vectors.len(), 3);

    // Build and persist, then reload from disk
    let index = VectorIndex::build(documents, vectors, "bucket-embedder", DIMENSION)
        .expect("build should succeed");
    let bundle = dir.path().join("index");
    let raw = dir.path().join("index.ivf");
    index.save(&bundle, &raw).expect("save should succeed");

    let loaded = Arc::new(VectorIndex::load(&bundle).expect("load should succeed"));
    assert_eq!(loaded.len(), 3);

    // Retrieve: the exact flattened text of row 1 finds row 1 first
    let retriever = Retriever::new(loaded, Arc::new(BucketEmbedder), DIMENSION, 8)
        .expect("retriever should construct");
    let hits = retriever
        .retrieve("1 10.0 1010.2 14.2 35.1 ST-2 ok -12.5 -45.2 2023-04-01", 2)
        .expect("retrieve should succeed");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document.row_index, 1);
    assert!(hits[0].distance <= hits[1].distance);

    // Synthesize with a canned completion, then sanitize
    let synthesizer = Synthesizer::new(Arc::new(CannedCompleter(
        "Let me confirm the station first.\n\n\
         Measurements: depth 10m, temperature 14.2 °C, salinity 35.1PSU\n\
         Latitude: -12.5° Longitude: -45.2°",
    )));
    let raw_answer = synthesizer
        .synthesize("temperature on 2023-04-01", hits)
        .expect("synthesis should succeed");
    assert_eq!(raw_answer.documents.len(), 2);

    let sanitizer = Sanitizer::new(&SanitizerConfig::default());
    let answer = sanitizer.sanitize("temperature on 2023-04-01", &raw_answer.text);

    assert!(answer.starts_with("Measurements:"), "got: {answer}");
    assert!(answer.contains("depth 10 meters"), "got: {answer}");
    assert!(answer.contains("temperature 14.2°C"), "got: {answer}");
    assert!(answer.contains("salinity 35.1 PSU"), "got: {answer}");
    assert!(answer.contains("Latitude: -12.5° S"), "got: {answer}");
    assert!(answer.contains("Longitude: -45.2° W"), "got: {answer}");
}

#[test]
fn rebuilding_replaces_the_persisted_bundle() {
    let dir = TempDir::new().expect("temp dir should be creatable");
    let csv_path = write_csv(&dir);
    let bundle = dir.path().join("index");
    let raw = dir.path().join("index.ivf");

    let documents = ingest_documents(&csv_path);
    let vectors: Vec<Vec<f32>> = documents.iter().map(|d| bucket_vector(&d.text)).collect();

    let first = VectorIndex::build(documents.clone(), vectors.clone(), "bucket-embedder", DIMENSION)
        .expect("build should succeed");
    first.save(&bundle, &raw).expect("first save should succeed");

    // Second ingest of a smaller corpus fully replaces the first bundle
    let second = VectorIndex::build(
        documents[..2].to_vec(),
        vectors[..2].to_vec(),
        "bucket-embedder",
        DIMENSION,
    )
    .expect("build should succeed");
    second.save(&bundle, &raw).expect("second save should succeed");

    let loaded = VectorIndex::load(&bundle).expect("load should succeed");
    assert_eq!(loaded.len(), 2);
    assert!(!bundle.with_extension("staging").exists());
    assert!(!bundle.with_extension("old").exists());
    assert!(raw.exists());
}

#[test]
fn querying_with_a_different_model_fails_fast() {
    let dir = TempDir::new().expect("temp dir should be creatable");
    let csv_path = write_csv(&dir);
    let bundle = dir.path().join("index");
    let raw = dir.path().join("index.ivf");

    let documents = ingest_documents(&csv_path);
    let vectors: Vec<Vec<f32>> = documents.iter().map(|d| bucket_vector(&d.text)).collect();
    VectorIndex::build(documents, vectors, "some-other-model", DIMENSION)
        .expect("build should succeed")
        .save(&bundle, &raw)
        .expect("save should succeed");

    let loaded = Arc::new(VectorIndex::load(&bundle).expect("load should succeed"));
    let result = Retriever::new(loaded, Arc::new(BucketEmbedder), DIMENSION, 8);
    assert!(matches!(
        result,
        Err(floatchat::FloatError::IndexUnavailable(_))
    ));
}
