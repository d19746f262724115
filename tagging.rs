use crate::error::Result;
use crate::models::TagRecord;
use chrono::Utc;
use rand::seq::SliceRandom;
use rusqlite::{params, Connection, OptionalExtension};

/// Fixed palette for auto-created tags.
const TAG_COLORS: &[&str] = &[
    "#ef4444", "#f59e0b", "#10b981", "#3b82f6", "#8b5cf6", "#ec4899",
];

pub fn random_color() -> String {
    TAG_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(TAG_COLORS[0])
        .to_string()
}

pub fn get_tag(conn: &Connection, name: &str) -> Result<Option<TagRecord>> {
    let tag = conn
        .query_row(
            "SELECT name, color, count, created_at FROM tags WHERE name = ?1",
            params![name],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

pub fn list_tags(conn: &Connection) -> Result<Vec<TagRecord>> {
    let mut stmt = conn.prepare("SELECT name, color, count, created_at FROM tags ORDER BY name")?;
    let rows = stmt.query_map([], tag_from_row)?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

fn tag_from_row(row: &rusqlite::Row) -> rusqlite::Result<TagRecord> {
    Ok(TagRecord {
        name: row.get(0)?,
        color: row.get(1)?,
        count: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Creates a tag with count 0. A name that already exists is left untouched.
pub fn create_tag(conn: &Connection, name: &str, color: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO tags (name, color, count, created_at) VALUES (?1, ?2, 0, ?3)",
        params![name, color, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

pub fn update_tag_color(conn: &Connection, name: &str, color: &str) -> Result<()> {
    conn.execute(
        "UPDATE tags SET color = ?2 WHERE name = ?1",
        params![name, color],
    )?;
    Ok(())
}

/// Strips the tag from every image carrying it, then deletes the tag record.
/// Deleting an already-absent tag is a no-op.
pub fn delete_tag(conn: &mut Connection, name: &str) -> Result<()> {
    let tx = conn.transaction()?;
    let stripped = tx.execute("DELETE FROM image_tags WHERE tag = ?1", params![name])?;
    tx.execute("DELETE FROM tags WHERE name = ?1", params![name])?;
    tx.commit()?;
    if stripped > 0 {
        log::info!("Removed tag '{name}' from {stripped} image(s)");
    }
    Ok(())
}

/// Adds a tag to one image's tag set. Attaching a tag the image already
/// carries is a no-op; the tag record is created (palette color, count 1)
/// on first use anywhere.
pub fn attach_tag(conn: &mut Connection, image_id: i64, name: &str) -> Result<()> {
    let tx = conn.transaction()?;
    let exists = tx
        .query_row("SELECT 1 FROM images WHERE id = ?1", params![image_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        log::debug!("attach_tag: image {image_id} no longer exists");
        return Ok(());
    }

    let inserted = tx.execute(
        "INSERT OR IGNORE INTO image_tags (image_id, tag) VALUES (?1, ?2)",
        params![image_id, name],
    )?;
    if inserted > 0 {
        let bumped = tx.execute("UPDATE tags SET count = count + 1 WHERE name = ?1", params![name])?;
        if bumped == 0 {
            tx.execute(
                "INSERT INTO tags (name, color, count, created_at) VALUES (?1, ?2, 1, ?3)",
                params![name, random_color(), Utc::now().timestamp_millis()],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Removes a tag from one image's tag set. Detaching an absent tag is a
/// no-op; the tag record stays, its count adjusted.
pub fn detach_tag(conn: &mut Connection, image_id: i64, name: &str) -> Result<()> {
    let tx = conn.transaction()?;
    let removed = tx.execute(
        "DELETE FROM image_tags WHERE image_id = ?1 AND tag = ?2",
        params![image_id, name],
    )?;
    if removed > 0 {
        tx.execute(
            "UPDATE tags SET count = count - 1 WHERE name = ?1 AND count > 0",
            params![name],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Recomputes every tag's usage count from the image table in one statement.
/// Idempotent, safe after arbitrary bulk mutations; tags whose tally fell to
/// zero keep their record with count 0.
pub fn recalculate_tag_counts(conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE tags SET count =
             (SELECT COUNT(*) FROM image_tags WHERE image_tags.tag = tags.name)",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, init_memory_database};
    use crate::models::ImageRecord;

    fn seeded(paths: &[&str]) -> (db::DbPool, Vec<i64>) {
        let pool = init_memory_database().unwrap();
        let mut conn = pool.get().unwrap();
        let drafts = paths
            .iter()
            .map(|p| {
                ImageRecord::draft(p.to_string(), p.to_string(), 1, 1, "root".to_string())
            })
            .collect();
        db::merge_images(&mut conn, drafts).unwrap();
        let ids = db::list_images(&conn).unwrap().iter().map(|i| i.id.unwrap()).collect();
        drop(conn);
        (pool, ids)
    }

    #[test]
    fn attach_creates_tag_with_count_one() {
        let (pool, ids) = seeded(&["a.jpg"]);
        let mut conn = pool.get().unwrap();

        attach_tag(&mut conn, ids[0], "funny").unwrap();

        let tag = get_tag(&conn, "funny").unwrap().unwrap();
        assert_eq!(tag.count, 1);
        assert!(tag.color.starts_with('#'));
        assert_eq!(db::tags_for_image(&conn, ids[0]).unwrap(), vec!["funny".to_string()]);
    }

    #[test]
    fn attach_is_idempotent_per_image() {
        let (pool, ids) = seeded(&["a.jpg"]);
        let mut conn = pool.get().unwrap();

        attach_tag(&mut conn, ids[0], "funny").unwrap();
        attach_tag(&mut conn, ids[0], "funny").unwrap();

        assert_eq!(get_tag(&conn, "funny").unwrap().unwrap().count, 1);
    }

    #[test]
    fn attach_to_missing_image_is_a_no_op() {
        let (pool, _) = seeded(&[]);
        let mut conn = pool.get().unwrap();

        attach_tag(&mut conn, 404, "ghost").unwrap();
        assert!(get_tag(&conn, "ghost").unwrap().is_none());
    }

    #[test]
    fn detach_adjusts_count_and_keeps_record() {
        let (pool, ids) = seeded(&["a.jpg", "b.jpg"]);
        let mut conn = pool.get().unwrap();

        attach_tag(&mut conn, ids[0], "funny").unwrap();
        attach_tag(&mut conn, ids[1], "funny").unwrap();
        detach_tag(&mut conn, ids[0], "funny").unwrap();

        let tag = get_tag(&conn, "funny").unwrap().unwrap();
        assert_eq!(tag.count, 1);
        assert!(db::tags_for_image(&conn, ids[0]).unwrap().is_empty());
    }

    #[test]
    fn detach_absent_tag_is_a_no_op() {
        let (pool, ids) = seeded(&["a.jpg"]);
        let mut conn = pool.get().unwrap();

        attach_tag(&mut conn, ids[0], "funny").unwrap();
        detach_tag(&mut conn, ids[0], "cute").unwrap();

        assert_eq!(get_tag(&conn, "funny").unwrap().unwrap().count, 1);
    }

    #[test]
    fn create_tag_keeps_existing_record() {
        let (pool, _) = seeded(&[]);
        let conn = pool.get().unwrap();

        create_tag(&conn, "funny", "#ef4444").unwrap();
        create_tag(&conn, "funny", "#000000").unwrap();

        let tag = get_tag(&conn, "funny").unwrap().unwrap();
        assert_eq!(tag.color, "#ef4444");
        assert_eq!(tag.count, 0);
    }

    #[test]
    fn delete_tag_strips_every_image_and_is_idempotent() {
        let (pool, ids) = seeded(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut conn = pool.get().unwrap();

        for id in &ids {
            attach_tag(&mut conn, *id, "meme").unwrap();
        }
        attach_tag(&mut conn, ids[0], "keeper").unwrap();

        delete_tag(&mut conn, "meme").unwrap();
        assert!(get_tag(&conn, "meme").unwrap().is_none());
        for id in &ids {
            assert!(!db::tags_for_image(&conn, *id).unwrap().contains(&"meme".to_string()));
        }
        assert_eq!(get_tag(&conn, "keeper").unwrap().unwrap().count, 1);

        // Running it again must not fail or disturb anything
        delete_tag(&mut conn, "meme").unwrap();
        assert_eq!(get_tag(&conn, "keeper").unwrap().unwrap().count, 1);
    }

    #[test]
    fn recalculate_is_idempotent() {
        let (pool, ids) = seeded(&["a.jpg", "b.jpg"]);
        let mut conn = pool.get().unwrap();

        attach_tag(&mut conn, ids[0], "funny").unwrap();
        attach_tag(&mut conn, ids[1], "funny").unwrap();
        attach_tag(&mut conn, ids[0], "cute").unwrap();

        // Skew the counts on purpose, then recompute twice
        conn.execute("UPDATE tags SET count = 99", []).unwrap();
        recalculate_tag_counts(&conn).unwrap();
        let once: Vec<(String, i64)> = list_tags(&conn)
            .unwrap()
            .into_iter()
            .map(|t| (t.name, t.count))
            .collect();
        recalculate_tag_counts(&conn).unwrap();
        let twice: Vec<(String, i64)> = list_tags(&conn)
            .unwrap()
            .into_iter()
            .map(|t| (t.name, t.count))
            .collect();

        assert_eq!(once, twice);
        assert_eq!(
            once,
            vec![("cute".to_string(), 1), ("funny".to_string(), 2)]
        );
    }

    #[test]
    fn recalculate_zeroes_unused_tags_without_deleting() {
        let (pool, _) = seeded(&[]);
        let conn = pool.get().unwrap();

        create_tag(&conn, "orphan", "#10b981").unwrap();
        conn.execute("UPDATE tags SET count = 5", []).unwrap();
        recalculate_tag_counts(&conn).unwrap();

        let tag = get_tag(&conn, "orphan").unwrap().unwrap();
        assert_eq!(tag.count, 0);
    }

    #[test]
    fn random_color_draws_from_palette() {
        for _ in 0..20 {
            let color = random_color();
            assert!(TAG_COLORS.contains(&color.as_str()));
        }
    }
}
