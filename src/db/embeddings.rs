//! Embedding blob storage.

use rusqlite::params;

use super::PhotoStore;
use crate::error::Result;

/// Embedding record from the database.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub photo_id: String,
    pub vector: Vec<f32>,
    pub model_version: String,
}

impl PhotoStore {
    /// Store (or replace) the embedding for a photo. Fails if the photo id is
    /// unknown: the foreign key requires a valid photos row.
    pub fn store_embedding(
        &self,
        photo_id: &str,
        vector: &[f32],
        model_version: &str,
    ) -> Result<()> {
        let bytes = vector_to_bytes(vector);
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO embeddings (photo_id, vector, embedding_dim, model_version, created_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            "#,
            params![photo_id, bytes, vector.len() as i64, model_version],
        )?;
        Ok(())
    }

    /// Get the stored embedding for a photo.
    pub fn get_embedding(&self, photo_id: &str) -> Result<Option<StoredEmbedding>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT photo_id, vector, model_version FROM embeddings WHERE photo_id = ?",
            [photo_id],
            |row| {
                let bytes: Vec<u8> = row.get(1)?;
                Ok(StoredEmbedding {
                    photo_id: row.get(0)?,
                    vector: bytes_to_vector(&bytes),
                    model_version: row.get(2)?,
                })
            },
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Count photos with a stored embedding.
    pub fn count_embeddings(&self) -> Result<i64> {
        let conn = self.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Convert f32 slice to little-endian bytes for storage.
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &val in vector {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to an f32 vector.
fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().expect("chunks_exact yields 4 bytes");
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EmbeddingStatus, PhotoRecord};

    fn seed_photo(store: &PhotoStore, id: &str) {
        store
            .upsert_photo(&PhotoRecord {
                id: id.to_string(),
                uri: format!("file:///photos/{id}.jpg"),
                created_at: 1,
                width: None,
                height: None,
                status: EmbeddingStatus::Pending,
            })
            .unwrap();
    }

    #[test]
    fn test_vector_conversion_roundtrip() {
        let original = vec![1.5, -2.3, 0.0, 100.0];
        let bytes = vector_to_bytes(&original);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_vector(&bytes), original);
    }

    #[test]
    fn test_store_and_get_embedding() {
        let store = PhotoStore::open_in_memory().unwrap();
        seed_photo(&store, "a");
        store.store_embedding("a", &[0.1, 0.2, 0.3], "clip-vit-b32").unwrap();

        let record = store.get_embedding("a").unwrap().unwrap();
        assert_eq!(record.vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(record.model_version, "clip-vit-b32");
        assert_eq!(store.count_embeddings().unwrap(), 1);

        // Replace keeps a single row
        store.store_embedding("a", &[0.9], "clip-vit-b32").unwrap();
        assert_eq!(store.count_embeddings().unwrap(), 1);
        assert_eq!(store.get_embedding("a").unwrap().unwrap().vector, vec![0.9]);
    }

    #[test]
    fn test_embedding_requires_photo_row() {
        let store = PhotoStore::open_in_memory().unwrap();
        assert!(store.store_embedding("missing", &[0.1], "m").is_err());
    }

    #[test]
    fn test_get_embedding_missing() {
        let store = PhotoStore::open_in_memory().unwrap();
        assert!(store.get_embedding("nope").unwrap().is_none());
    }
}
