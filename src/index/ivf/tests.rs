use super::*;

fn unit_vectors(n: usize, dimension: usize) -> Vec<Vec<f32>> {
    // Spread points along a line so nearest-neighbor order is unambiguous
    (0..n)
        .map(|i| {
            let mut v = vec![0.0; dimension];
            v[0] = i as f32;
            v
        })
        .collect()
}

fn build_index(vectors: &[Vec<f32>]) -> IvfFlatIndex {
    let nlist = clustering_factor(vectors.len());
    let mut index =
        IvfFlatIndex::train(vectors, nlist, 42).expect("training should succeed");
    for vector in vectors {
        index.add(vector.clone()).expect("add should succeed");
    }
    index
}

#[test]
fn clustering_factor_bounds() {
    assert_eq!(clustering_factor(0), 1);
    assert_eq!(clustering_factor(5), 1);
    assert_eq!(clustering_factor(10), 1);
    assert_eq!(clustering_factor(250), 25);
    assert_eq!(clustering_factor(1000), 100);
    assert_eq!(clustering_factor(1_000_000), 100);
}

#[test]
fn training_on_empty_set_fails() {
    assert!(IvfFlatIndex::train(&[], 4, 42).is_err());
}

#[test]
fn training_rejects_mixed_dimensions() {
    let vectors = vec![vec![0.0, 1.0], vec![0.0, 1.0, 2.0]];
    assert!(IvfFlatIndex::train(&vectors, 1, 42).is_err());
}

#[test]
fn add_rejects_wrong_dimension() {
    let vectors = unit_vectors(4, 3);
    let mut index = IvfFlatIndex::train(&vectors, 1, 42).expect("training should succeed");
    assert!(index.add(vec![0.0, 1.0]).is_err());
}

#[test]
fn slots_follow_add_order() {
    let vectors = unit_vectors(6, 3);
    let mut index = IvfFlatIndex::train(&vectors, 2, 42).expect("training should succeed");
    for (expected_slot, vector) in vectors.iter().enumerate() {
        let slot = index.add(vector.clone()).expect("add should succeed");
        assert_eq!(slot, expected_slot);
    }
    assert_eq!(index.len(), 6);
}

#[test]
fn exact_vector_is_its_own_nearest_neighbor() {
    let vectors = unit_vectors(50, 4);
    let index = build_index(&vectors);

    for (slot, vector) in vectors.iter().enumerate() {
        let hits = index
            .search(vector, 3, index.nlist())
            .expect("search should succeed");
        assert_eq!(hits[0].0, slot, "vector {slot} should retrieve itself first");
        assert!(hits[0].1.abs() < 1e-6);
    }
}

#[test]
fn search_returns_nearest_first() {
    let vectors = unit_vectors(30, 2);
    let index = build_index(&vectors);

    let query = vec![10.2, 0.0];
    let hits = index
        .search(&query, 3, index.nlist())
        .expect("search should succeed");

    assert_eq!(hits[0].0, 10);
    for pair in hits.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "distances should be non-decreasing");
    }
}

#[test]
fn k_larger_than_corpus_returns_all() {
    let vectors = unit_vectors(4, 2);
    let index = build_index(&vectors);

    let hits = index
        .search(&[0.0, 0.0], 10, index.nlist())
        .expect("search should succeed");
    assert_eq!(hits.len(), 4);
}

#[test]
fn equal_distances_break_ties_by_slot() {
    // Two identical vectors: the lower slot must come first
    let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![5.0, 0.0]];
    let index = build_index(&vectors);

    let hits = index
        .search(&[1.0, 0.0], 2, index.nlist())
        .expect("search should succeed");
    assert_eq!(hits[0].0, 0);
    assert_eq!(hits[1].0, 1);
}

#[test]
fn k_beyond_corpus_scans_every_list() {
    // Enough vectors for several partitions, probing fewer than nlist
    let vectors = unit_vectors(95, 3);
    let index = build_index(&vectors);
    assert!(index.nlist() > 8);

    let hits = index
        .search(&[0.0, 0.0, 0.0], 200, 8)
        .expect("search should succeed");
    assert_eq!(hits.len(), 95);
}

#[test]
fn search_rejects_wrong_query_dimension() {
    let vectors = unit_vectors(10, 3);
    let index = build_index(&vectors);
    assert!(index.search(&[0.0, 0.0], 3, 1).is_err());
}

#[test]
fn training_is_reproducible_for_a_fixed_seed() {
    let vectors = unit_vectors(40, 3);
    let a = build_index(&vectors);
    let b = build_index(&vectors);

    let query = vec![17.3, 0.0, 0.0];
    let hits_a = a.search(&query, 5, a.nlist()).expect("search should succeed");
    let hits_b = b.search(&query, 5, b.nlist()).expect("search should succeed");
    assert_eq!(hits_a, hits_b);
}
