use crate::error::Result;
use crate::models::{DirectoryRecord, ImageRecord};
use crate::schema;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initializes the database connection pool and runs migrations.
pub fn init_database(db_path: &Path) -> Result<DbPool> {
    log::info!("Database path: {}", db_path.display());

    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )
    });
    let pool = r2d2::Pool::new(manager)?;

    run_migrations(&*pool.get()?)?;

    Ok(pool)
}

/// Pool over a single in-memory connection. Capped at one connection so
/// every caller sees the same database.
pub fn init_memory_database() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;

    run_migrations(&*pool.get()?)?;

    Ok(pool)
}

/// Applies all pending database migrations.
fn run_migrations(connection: &Connection) -> Result<()> {
    log::info!("Running database migrations...");

    // Migration 0001: Initial Schema
    connection.execute_batch(schema::MIGRATION_0001)?;

    log::info!("Migrations applied successfully.");
    Ok(())
}

const IMAGE_COLUMNS: &str =
    "id, path, name, size, last_modified, directory_handle, thumbnail, favorite, date_added";

fn image_from_row(row: &Row) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: Some(row.get(0)?),
        path: row.get(1)?,
        name: row.get(2)?,
        size: row.get(3)?,
        last_modified: row.get(4)?,
        directory_handle: row.get(5)?,
        thumbnail: row.get(6)?,
        favorite: row.get(7)?,
        date_added: row.get(8)?,
        tags: Vec::new(),
    })
}

/// Loads the full image table, tags attached.
pub fn list_images(conn: &Connection) -> Result<Vec<ImageRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {IMAGE_COLUMNS} FROM images ORDER BY id"))?;
    let rows = stmt.query_map([], image_from_row)?;

    let mut images = Vec::new();
    for row in rows {
        images.push(row?);
    }

    let mut tags = tag_sets(conn)?;
    for image in &mut images {
        if let Some(id) = image.id {
            if let Some(set) = tags.remove(&id) {
                image.tags = set;
            }
        }
    }
    Ok(images)
}

fn tag_sets(conn: &Connection) -> Result<HashMap<i64, Vec<String>>> {
    let mut stmt = conn.prepare("SELECT image_id, tag FROM image_tags ORDER BY image_id, tag")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut sets: HashMap<i64, Vec<String>> = HashMap::new();
    for row in rows {
        let (image_id, tag) = row?;
        sets.entry(image_id).or_default().push(tag);
    }
    Ok(sets)
}

pub fn get_image(conn: &Connection, image_id: i64) -> Result<Option<ImageRecord>> {
    let image = conn
        .query_row(
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"),
            params![image_id],
            image_from_row,
        )
        .optional()?;

    match image {
        Some(mut image) => {
            image.tags = tags_for_image(conn, image_id)?;
            Ok(Some(image))
        }
        None => Ok(None),
    }
}

pub fn tags_for_image(conn: &Connection, image_id: i64) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT tag FROM image_tags WHERE image_id = ?1 ORDER BY tag")?;
    let rows = stmt.query_map(params![image_id], |row| row.get::<_, String>(0))?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

/// Upserts every record (keyed on `path`) and rewrites its tag set, in a
/// single transaction. All-or-nothing: a failure rolls the whole batch back.
pub fn bulk_put_images(conn: &mut Connection, records: &[ImageRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    {
        let mut upsert = tx.prepare_cached(
            "INSERT INTO images
                (path, name, size, last_modified, directory_handle, thumbnail, favorite, date_added)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                 name=excluded.name,
                 size=excluded.size,
                 last_modified=excluded.last_modified,
                 directory_handle=excluded.directory_handle,
                 thumbnail=excluded.thumbnail,
                 favorite=excluded.favorite,
                 date_added=excluded.date_added
             RETURNING id",
        )?;
        let mut clear_tags = tx.prepare_cached("DELETE FROM image_tags WHERE image_id = ?1")?;
        let mut insert_tag =
            tx.prepare_cached("INSERT OR IGNORE INTO image_tags (image_id, tag) VALUES (?1, ?2)")?;

        for record in records {
            let id: i64 = upsert.query_row(
                params![
                    record.path,
                    record.name,
                    record.size,
                    record.last_modified,
                    record.directory_handle,
                    record.thumbnail,
                    record.favorite,
                    record.date_added
                ],
                |row| row.get(0),
            )?;
            clear_tags.execute(params![id])?;
            for tag in &record.tags {
                insert_tag.execute(params![id, tag])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Combines freshly scanned drafts with previously persisted records.
/// Filesystem facts (name, size, last_modified, directory_handle) come from
/// the draft; identity, tags, favorite and date_added are preserved for
/// paths already known. Unknown paths pass through as-is.
pub fn merge_records(existing: &[ImageRecord], drafts: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let by_path: HashMap<&str, &ImageRecord> =
        existing.iter().map(|img| (img.path.as_str(), img)).collect();

    drafts
        .into_iter()
        .map(|mut draft| {
            if let Some(prev) = by_path.get(draft.path.as_str()) {
                draft.id = prev.id;
                draft.tags = prev.tags.clone();
                draft.favorite = prev.favorite;
                draft.date_added = prev.date_added;
            }
            draft
        })
        .collect()
}

/// Merges a scan result into the image table and recomputes tag counts.
/// Paths missing from the scan are left untouched; explicit deletion is the
/// only path that removes records.
pub fn merge_images(conn: &mut Connection, drafts: Vec<ImageRecord>) -> Result<usize> {
    let existing = list_images(conn)?;
    let merged = merge_records(&existing, drafts);
    bulk_put_images(conn, &merged)?;
    crate::tagging::recalculate_tag_counts(conn)?;
    Ok(merged.len())
}

/// Replaces one image's tag set. A vanished image id is a silent no-op.
pub fn update_image_tags(conn: &mut Connection, image_id: i64, tags: &[String]) -> Result<()> {
    let tx = conn.transaction()?;
    let exists = tx
        .query_row("SELECT 1 FROM images WHERE id = ?1", params![image_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        log::debug!("update_image_tags: image {image_id} no longer exists");
        return Ok(());
    }
    tx.execute("DELETE FROM image_tags WHERE image_id = ?1", params![image_id])?;
    {
        let mut insert =
            tx.prepare_cached("INSERT OR IGNORE INTO image_tags (image_id, tag) VALUES (?1, ?2)")?;
        for tag in tags {
            insert.execute(params![image_id, tag])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Flips an image's favorite flag. A vanished image id is a silent no-op.
pub fn toggle_favorite(conn: &Connection, image_id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE images SET favorite = NOT favorite WHERE id = ?1",
        params![image_id],
    )?;
    if changed == 0 {
        log::debug!("toggle_favorite: image {image_id} no longer exists");
    }
    Ok(())
}

/// Deletes an image (tag rows cascade) and recomputes tag counts.
pub fn delete_image(conn: &mut Connection, image_id: i64) -> Result<()> {
    conn.execute("DELETE FROM images WHERE id = ?1", params![image_id])?;
    crate::tagging::recalculate_tag_counts(conn)?;
    Ok(())
}

/// Persists a rendered thumbnail. Last write wins for racing re-renders of
/// the same image; a vanished image id is a silent no-op.
pub fn set_thumbnail(conn: &Connection, image_id: i64, thumbnail: &[u8]) -> Result<()> {
    let changed = conn.execute(
        "UPDATE images SET thumbnail = ?2 WHERE id = ?1",
        params![image_id, thumbnail],
    )?;
    if changed == 0 {
        log::debug!("set_thumbnail: image {image_id} no longer exists");
    }
    Ok(())
}

pub fn list_images_missing_thumbnail(conn: &Connection) -> Result<Vec<ImageRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {IMAGE_COLUMNS} FROM images WHERE thumbnail IS NULL ORDER BY id"
    ))?;
    let rows = stmt.query_map([], image_from_row)?;

    let mut images = Vec::new();
    for row in rows {
        images.push(row?);
    }
    Ok(images)
}

pub fn upsert_directory(conn: &Connection, dir: &DirectoryRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO directories (id, name, last_scanned, image_count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             name=excluded.name,
             last_scanned=excluded.last_scanned,
             image_count=excluded.image_count",
        params![dir.id, dir.name, dir.last_scanned, dir.image_count],
    )?;
    Ok(())
}

pub fn list_directories(conn: &Connection) -> Result<Vec<DirectoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, last_scanned, image_count FROM directories ORDER BY last_scanned DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DirectoryRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            last_scanned: row.get(2)?,
            image_count: row.get(3)?,
        })
    })?;

    let mut dirs = Vec::new();
    for row in rows {
        dirs.push(row?);
    }
    Ok(dirs)
}
