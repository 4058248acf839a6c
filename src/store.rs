//! Flat vector index with a parallel metadata list and whole-file persistence.
//!
//! One logical record is split across two physical collections: a dense
//! little-endian `f32` buffer holding the vectors and an ordered metadata
//! list. [`VectorStore`] exposes only paired operations so no caller can
//! advance one collection without the other — the central consistency
//! invariant of the subsystem.
//!
//! Vectors are unit-normalized on insert and queries are normalized the same
//! way, so the squared-L2 distances reported by [`VectorStore::search`] order
//! results identically to cosine distance.
//!
//! Persistence is two artifacts in one directory: `index.bin` (header plus
//! raw vector data) and `metadata.json` (the ordered metadata list). Both are
//! rewritten wholesale on every [`VectorStore::persist`] via a temp-file
//! rename, so a failed write never clobbers the previous state. A directory
//! holding only one of the two artifacts is treated as corruption, never
//! silently repaired.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RetrievalError;
use crate::models::{ChunkMetadata, SearchHit};

/// Leading bytes of `index.bin`; bumped if the layout ever changes.
const INDEX_MAGIC: &[u8; 8] = b"RAGIDX01";

const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";

/// Append-only flat nearest-neighbor index over unit-normalized vectors.
#[derive(Debug)]
pub struct VectorStore {
    dir: PathBuf,
    dims: usize,
    /// Dense row-major vector data, `dims` floats per record.
    vectors: Vec<f32>,
    /// Entry *i* describes vector *i*. Same length as `vectors.len() / dims`.
    metadata: Vec<ChunkMetadata>,
}

impl VectorStore {
    /// Load the store from `dir`, or create an empty one when neither
    /// artifact exists yet.
    ///
    /// Fails with [`RetrievalError::CorruptIndex`] when exactly one artifact
    /// is present, or when the artifacts disagree with each other or with the
    /// configured dimension.
    pub fn open(dir: &Path, dims: usize) -> Result<Self, RetrievalError> {
        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        match (index_path.exists(), metadata_path.exists()) {
            (false, false) => Ok(Self {
                dir: dir.to_path_buf(),
                dims,
                vectors: Vec::new(),
                metadata: Vec::new(),
            }),
            (true, true) => {
                let (stored_dims, vectors) = read_index_file(&index_path)?;
                if stored_dims != dims {
                    return Err(RetrievalError::CorruptIndex(format!(
                        "index dimension {} does not match configured dimension {}",
                        stored_dims, dims
                    )));
                }
                let metadata = read_metadata_file(&metadata_path)?;
                let record_count = vectors.len() / dims;
                if metadata.len() != record_count {
                    return Err(RetrievalError::CorruptIndex(format!(
                        "index holds {} records but metadata holds {}",
                        record_count,
                        metadata.len()
                    )));
                }
                Ok(Self {
                    dir: dir.to_path_buf(),
                    dims,
                    vectors,
                    metadata,
                })
            }
            (index_present, _) => {
                let (present, missing) = if index_present {
                    (INDEX_FILE, METADATA_FILE)
                } else {
                    (METADATA_FILE, INDEX_FILE)
                };
                Err(RetrievalError::CorruptIndex(format!(
                    "{} exists but {} is missing in {}",
                    present,
                    missing,
                    dir.display()
                )))
            }
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Configured embedding dimension.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Append a batch of vectors with their metadata records.
    ///
    /// The batch is validated in full before either collection is touched:
    /// on any [`RetrievalError::ShapeMismatch`] both collections keep their
    /// pre-call lengths.
    pub fn add(
        &mut self,
        vectors: &[Vec<f32>],
        metadata: Vec<ChunkMetadata>,
    ) -> Result<(), RetrievalError> {
        if vectors.len() != metadata.len() {
            return Err(RetrievalError::ShapeMismatch(format!(
                "{} vectors but {} metadata records",
                vectors.len(),
                metadata.len()
            )));
        }
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dims {
                return Err(RetrievalError::ShapeMismatch(format!(
                    "vector {} has dimension {}, expected {}",
                    i,
                    vector.len(),
                    self.dims
                )));
            }
        }

        for vector in vectors {
            self.vectors.extend(normalize(vector));
        }
        self.metadata.extend(metadata);
        Ok(())
    }

    /// Return up to `k` records nearest to `query`, ascending by squared-L2
    /// distance, ties broken by insertion order.
    ///
    /// An empty store yields an empty result, never an error. Index positions
    /// without a matching metadata entry are skipped (the invariant makes
    /// this unreachable in a healthy store, but it protects against an
    /// out-of-date index file paired with newer metadata).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(RetrievalError::ShapeMismatch(format!(
                "query has dimension {}, expected {}",
                query.len(),
                self.dims
            )));
        }

        let query = normalize(query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(i, stored)| (i, squared_l2(&query, stored)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .filter_map(|(i, distance)| {
                self.metadata.get(i).map(|metadata| SearchHit {
                    metadata: metadata.clone(),
                    distance,
                })
            })
            .collect())
    }

    /// Serialize both artifacts to the store directory.
    ///
    /// Both artifacts are fully written to temp files before either live
    /// file is replaced, so a failure at any point leaves the previous
    /// artifact pair on disk, intact and mutually consistent.
    pub fn persist(&self) -> Result<(), RetrievalError> {
        // Serialize before any filesystem mutation.
        let json = serde_json::to_vec(&self.metadata)
            .map_err(|e| RetrievalError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        fs::create_dir_all(&self.dir)?;

        let index_tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        let metadata_tmp = self.dir.join(format!("{}.tmp", METADATA_FILE));
        fs::write(&index_tmp, self.encode_index())?;
        fs::write(&metadata_tmp, json)?;

        // Both temp files are complete; only now replace the live pair.
        fs::rename(&index_tmp, self.dir.join(INDEX_FILE))?;
        fs::rename(&metadata_tmp, self.dir.join(METADATA_FILE))?;

        Ok(())
    }

    fn encode_index(&self) -> Vec<u8> {
        let count = self.metadata.len() as u64;
        let mut out = Vec::with_capacity(8 + 4 + 8 + self.vectors.len() * 4);
        out.extend_from_slice(INDEX_MAGIC);
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for &v in &self.vectors {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

fn read_index_file(path: &Path) -> Result<(usize, Vec<f32>), RetrievalError> {
    let bytes = fs::read(path)?;
    if bytes.len() < 20 || &bytes[..8] != INDEX_MAGIC {
        return Err(RetrievalError::CorruptIndex(format!(
            "{} is not a recognized index file",
            path.display()
        )));
    }

    let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let count = u64::from_le_bytes([
        bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
    ]) as usize;

    let data = &bytes[20..];
    if dims == 0 || data.len() != count * dims * 4 {
        return Err(RetrievalError::CorruptIndex(format!(
            "index header claims {} records of dimension {} but holds {} data bytes",
            count,
            dims,
            data.len()
        )));
    }

    let vectors = data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dims, vectors))
}

fn read_metadata_file(path: &Path) -> Result<Vec<ChunkMetadata>, RetrievalError> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        RetrievalError::CorruptIndex(format!("{} failed to parse: {}", path.display(), e))
    })
}

/// Scale a vector to unit L2 length. A zero vector is returned unchanged
/// rather than divided into NaNs.
fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(document_id: i64, chunk_id: i64, text: &str) -> ChunkMetadata {
        ChunkMetadata {
            document_id,
            chunk_id,
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.chars().count().max(1),
        }
    }

    fn open_empty(dims: usize) -> (tempfile::TempDir, VectorStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = VectorStore::open(tmp.path(), dims).unwrap();
        (tmp, store)
    }

    #[test]
    fn open_missing_dir_yields_empty_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = VectorStore::open(&tmp.path().join("fresh"), 4).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.dims(), 4);
    }

    #[test]
    fn add_keeps_collections_parallel() {
        let (_tmp, mut store) = open_empty(3);
        for batch in 1..4 {
            let vectors: Vec<Vec<f32>> = (0..batch).map(|i| vec![i as f32, 1.0, 0.0]).collect();
            let metadata: Vec<ChunkMetadata> = (0..batch).map(|i| meta(1, i, "text")).collect();
            store.add(&vectors, metadata).unwrap();
        }
        assert_eq!(store.len(), 6);
        assert_eq!(store.vectors.len(), 6 * 3);
    }

    #[test]
    fn mismatched_batch_leaves_store_unchanged() {
        let (_tmp, mut store) = open_empty(3);
        store
            .add(&[vec![1.0, 0.0, 0.0]], vec![meta(1, 0, "a")])
            .unwrap();

        let err = store
            .add(&[vec![0.0, 1.0, 0.0]], vec![meta(1, 1, "b"), meta(1, 2, "c")])
            .unwrap_err();
        assert!(matches!(err, RetrievalError::ShapeMismatch(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.vectors.len(), 3);
    }

    #[test]
    fn wrong_dimension_leaves_store_unchanged() {
        let (_tmp, mut store) = open_empty(3);
        let err = store
            .add(
                &[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]],
                vec![meta(1, 0, "a"), meta(1, 1, "b")],
            )
            .unwrap_err();
        assert!(matches!(err, RetrievalError::ShapeMismatch(_)));
        assert_eq!(store.len(), 0);
        assert!(store.vectors.is_empty());
    }

    #[test]
    fn search_empty_store_returns_nothing() {
        let (_tmp, store) = open_empty(3);
        assert!(store.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert!(store.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn search_orders_by_distance() {
        let (_tmp, mut store) = open_empty(2);
        store
            .add(
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
                vec![meta(1, 0, "up"), meta(1, 1, "right"), meta(1, 2, "diag")],
            )
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].metadata.text, "right");
        assert_eq!(hits[1].metadata.text, "diag");
        assert_eq!(hits[2].metadata.text, "up");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[test]
    fn equal_distances_break_ties_by_insertion_order() {
        let (_tmp, mut store) = open_empty(2);
        // Same direction twice: identical distance after normalization.
        store
            .add(
                &[vec![2.0, 0.0], vec![4.0, 0.0], vec![0.0, 1.0]],
                vec![meta(1, 0, "first"), meta(2, 0, "second"), meta(3, 0, "far")],
            )
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].metadata.text, "first");
        assert_eq!(hits[1].metadata.text, "second");
        assert_eq!(hits[0].distance, hits[1].distance);
    }

    #[test]
    fn k_larger_than_store_returns_all() {
        let (_tmp, mut store) = open_empty(2);
        store
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![meta(1, 0, "a"), meta(1, 1, "b")],
            )
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn persist_then_open_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let mut store = VectorStore::open(&dir, 3).unwrap();
        store
            .add(
                &[vec![1.0, 2.0, 3.0], vec![-1.0, 0.5, 0.0]],
                vec![meta(7, 0, "chunk one"), meta(7, 1, "chunk two")],
            )
            .unwrap();
        store.persist().unwrap();

        let reloaded = VectorStore::open(&dir, 3).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.metadata, store.metadata);
        assert_eq!(reloaded.vectors, store.vectors);
    }

    #[test]
    fn failed_persist_preserves_previous_artifacts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let mut store = VectorStore::open(&dir, 2).unwrap();
        store
            .add(&[vec![1.0, 0.0]], vec![meta(1, 0, "kept")])
            .unwrap();
        store.persist().unwrap();

        // Block the metadata temp path with a directory so the next
        // serialization cannot complete.
        fs::create_dir_all(dir.join(format!("{}.tmp", METADATA_FILE))).unwrap();
        store
            .add(&[vec![0.0, 1.0]], vec![meta(1, 1, "new")])
            .unwrap();
        assert!(store.persist().is_err());

        // The live pair still holds the previously persisted state and
        // loads cleanly.
        let reloaded = VectorStore::open(&dir, 2).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.metadata[0].text, "kept");
    }

    #[test]
    fn lone_artifact_is_corruption() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let mut store = VectorStore::open(&dir, 2).unwrap();
        store
            .add(&[vec![1.0, 0.0]], vec![meta(1, 0, "a")])
            .unwrap();
        store.persist().unwrap();

        fs::remove_file(dir.join(METADATA_FILE)).unwrap();
        let err = VectorStore::open(&dir, 2).unwrap_err();
        assert!(matches!(err, RetrievalError::CorruptIndex(_)));
    }

    #[test]
    fn count_disagreement_is_corruption() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let mut store = VectorStore::open(&dir, 2).unwrap();
        store
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![meta(1, 0, "a"), meta(1, 1, "b")],
            )
            .unwrap();
        store.persist().unwrap();

        // Drop one metadata entry behind the store's back.
        let json = fs::read_to_string(dir.join(METADATA_FILE)).unwrap();
        let mut records: Vec<ChunkMetadata> = serde_json::from_str(&json).unwrap();
        records.pop();
        fs::write(
            dir.join(METADATA_FILE),
            serde_json::to_vec(&records).unwrap(),
        )
        .unwrap();

        let err = VectorStore::open(&dir, 2).unwrap_err();
        assert!(matches!(err, RetrievalError::CorruptIndex(_)));
    }

    #[test]
    fn dimension_disagreement_is_corruption() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let mut store = VectorStore::open(&dir, 2).unwrap();
        store
            .add(&[vec![1.0, 0.0]], vec![meta(1, 0, "a")])
            .unwrap();
        store.persist().unwrap();

        let err = VectorStore::open(&dir, 3).unwrap_err();
        assert!(matches!(err, RetrievalError::CorruptIndex(_)));
    }

    #[test]
    fn garbage_index_file_is_corruption() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INDEX_FILE), b"not an index").unwrap();
        fs::write(dir.join(METADATA_FILE), b"[]").unwrap();

        let err = VectorStore::open(&dir, 2).unwrap_err();
        assert!(matches!(err, RetrievalError::CorruptIndex(_)));
    }

    #[test]
    fn stored_vectors_are_normalized() {
        let (_tmp, mut store) = open_empty(2);
        store
            .add(&[vec![3.0, 4.0]], vec![meta(1, 0, "a")])
            .unwrap();
        let norm: f32 = store.vectors.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
