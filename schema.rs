/// MIGRATION 0001: Initial database schema.
pub const MIGRATION_0001: &str = r#"
-- Images Table: one row per scanned file, keyed by library-relative path.
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    last_modified INTEGER NOT NULL, -- Stored as epoch milliseconds
    directory_handle TEXT NOT NULL,
    thumbnail BLOB,
    favorite INTEGER NOT NULL DEFAULT 0,
    date_added INTEGER NOT NULL
);

-- Image Tags Table: the multi-entry tag index over images.
CREATE TABLE IF NOT EXISTS image_tags (
    image_id INTEGER NOT NULL,
    tag TEXT NOT NULL,
    FOREIGN KEY (image_id) REFERENCES images (id) ON DELETE CASCADE,
    UNIQUE (image_id, tag)
);

-- Tags Table: the tag vocabulary with denormalized usage counts.
CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY,
    color TEXT NOT NULL, -- '#RRGGBB'
    count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- Directories Table: metadata about scanned roots.
CREATE TABLE IF NOT EXISTS directories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    last_scanned INTEGER NOT NULL,
    image_count INTEGER NOT NULL DEFAULT 0
);

-- Indexes for faster queries
CREATE INDEX IF NOT EXISTS idx_images_path ON images (path);
CREATE INDEX IF NOT EXISTS idx_images_name ON images (name);
CREATE INDEX IF NOT EXISTS idx_images_last_modified ON images (last_modified);
CREATE INDEX IF NOT EXISTS idx_images_directory_handle ON images (directory_handle);
CREATE INDEX IF NOT EXISTS idx_images_favorite ON images (favorite);
CREATE INDEX IF NOT EXISTS idx_image_tags_image_id ON image_tags (image_id);
CREATE INDEX IF NOT EXISTS idx_image_tags_tag ON image_tags (tag);
CREATE INDEX IF NOT EXISTS idx_tags_count ON tags (count);
CREATE INDEX IF NOT EXISTS idx_directories_last_scanned ON directories (last_scanned);
"#;
