pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Photos table: one row per library asset, keyed by the source's stable id
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY NOT NULL,
    uri TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    width INTEGER,
    height INTEGER,
    embedding_status TEXT NOT NULL DEFAULT 'PENDING'  -- 'PENDING', 'COMPLETE', 'FAILED'
);

CREATE INDEX IF NOT EXISTS idx_photos_status ON photos(embedding_status);
CREATE INDEX IF NOT EXISTS idx_photos_created ON photos(created_at);

-- Embeddings for semantic search, one-to-one with photos
CREATE TABLE IF NOT EXISTS embeddings (
    photo_id TEXT PRIMARY KEY NOT NULL,
    vector BLOB NOT NULL,             -- float32 array stored as little-endian bytes
    embedding_dim INTEGER NOT NULL,
    model_version TEXT NOT NULL,      -- which model produced it, for future re-embedding
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE
);

-- Durable key/value state; holds the initial-scan-complete flag
CREATE TABLE IF NOT EXISTS scan_state (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

-- Generic durable work queue, decoupled from job semantics
CREATE TABLE IF NOT EXISTS job_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_type TEXT NOT NULL,           -- 'FetchMetadata', 'GenerateEmbedding'
    payload TEXT NOT NULL,            -- JSON
    status TEXT NOT NULL DEFAULT 'PENDING',  -- 'PENDING', 'RUNNING', 'DONE', 'FAILED'
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_queue_status ON job_queue(status);
CREATE INDEX IF NOT EXISTS idx_job_queue_type ON job_queue(job_type);
CREATE INDEX IF NOT EXISTS idx_job_queue_updated ON job_queue(updated_at);
"#;
