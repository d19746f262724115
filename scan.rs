use crate::db::{self, DbPool};
use crate::error::{Error, Result};
use crate::models::{DirectoryRecord, ImageRecord};
use crate::thumbnails;
use chrono::Utc;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Recursive directory enumeration. Implementations emit one draft per file
/// with a recognized image extension, `path` relative to the scanned root.
/// The backend is chosen once at the call boundary; everything downstream
/// sees only the draft sequence.
pub trait ScanBackend {
    fn scan(&self, root: &Path, on_progress: Option<&dyn Fn(usize)>) -> Result<Vec<ImageRecord>>;
}

/// Path-based traversal over the whole tree via `walkdir`.
pub struct PathBackend;

/// Traversal that descends with one open directory handle per level.
pub struct HandleBackend;

impl ScanBackend for PathBackend {
    fn scan(&self, root: &Path, on_progress: Option<&dyn Fn(usize)>) -> Result<Vec<ImageRecord>> {
        check_root(root)?;
        let token = root_token(root);

        let mut drafts = Vec::new();
        let entries = WalkDir::new(root).into_iter().filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {err}");
                None
            }
        });
        for entry in entries {
            if !entry.file_type().is_file() || !thumbnails::is_supported_image(entry.path()) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => {
                    drafts.push(draft_for(root, &token, entry.path(), &meta));
                    if let Some(progress) = on_progress {
                        progress(drafts.len());
                    }
                }
                Err(err) => log::warn!("Failed to stat {}: {err}", entry.path().display()),
            }
        }
        Ok(drafts)
    }
}

impl ScanBackend for HandleBackend {
    fn scan(&self, root: &Path, on_progress: Option<&dyn Fn(usize)>) -> Result<Vec<ImageRecord>> {
        check_root(root)?;
        let token = root_token(root);

        let handle = fs::read_dir(root).map_err(|err| classify_io(root, err))?;
        let mut drafts = Vec::new();
        walk_handle(handle, root, &token, &mut drafts, on_progress);
        Ok(drafts)
    }
}

fn walk_handle(
    handle: fs::ReadDir,
    root: &Path,
    token: &str,
    out: &mut Vec<ImageRecord>,
    on_progress: Option<&dyn Fn(usize)>,
) {
    for entry in handle {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                log::warn!("Failed to stat {}: {err}", path.display());
                continue;
            }
        };

        if file_type.is_dir() {
            match fs::read_dir(&path) {
                Ok(sub) => walk_handle(sub, root, token, out, on_progress),
                Err(err) => log::warn!("Skipping unreadable directory {}: {err}", path.display()),
            }
        } else if file_type.is_file() && thumbnails::is_supported_image(&path) {
            match entry.metadata() {
                Ok(meta) => {
                    out.push(draft_for(root, token, &path, &meta));
                    if let Some(progress) = on_progress {
                        progress(out.len());
                    }
                }
                Err(err) => log::warn!("Failed to stat {}: {err}", path.display()),
            }
        }
    }
}

/// Opaque token identifying a scanned root.
pub fn root_token(root: &Path) -> String {
    root.canonicalize()
        .unwrap_or_else(|_| root.to_path_buf())
        .to_string_lossy()
        .to_string()
}

fn check_root(root: &Path) -> Result<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::Path(format!("{} is not a directory", root.display()))),
        Err(err) => Err(classify_io(root, err)),
    }
}

fn classify_io(path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => Error::AccessDenied(path.display().to_string()),
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(err),
    }
}

fn mtime_millis(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn draft_for(root: &Path, token: &str, path: &Path, meta: &fs::Metadata) -> ImageRecord {
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    ImageRecord::draft(rel, name, meta.len() as i64, mtime_millis(meta), token.to_string())
}

/// Enumerates the root, merges the drafts into the store (preserving user
/// metadata for known paths), and refreshes the root's directory record.
pub fn run_scan(backend: &dyn ScanBackend, root: &Path, pool: &DbPool) -> Result<usize> {
    let progress: &dyn Fn(usize) = &|count| {
        if count % 500 == 0 {
            log::info!("Scan progress: {count} image(s) found");
        }
    };
    let drafts = backend.scan(root, Some(progress))?;
    let found = drafts.len();

    let mut conn = pool.get()?;
    db::merge_images(&mut conn, drafts)?;

    let name = root
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| root.display().to_string());
    db::upsert_directory(
        &conn,
        &DirectoryRecord {
            id: root_token(root),
            name,
            last_scanned: Utc::now().timestamp_millis(),
            image_count: found as i64,
        },
    )?;

    log::info!("Scan of {} complete: {found} image(s)", root.display());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"aaaa").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        std::fs::write(dir.path().join("sub/b.PNG"), b"bbbbbb").unwrap();
        std::fs::write(dir.path().join("sub/deep/c.gif"), b"cc").unwrap();
        std::fs::write(dir.path().join("sub/skip.md"), b"nope").unwrap();
        dir
    }

    fn sorted_paths(drafts: &[crate::models::ImageRecord]) -> Vec<String> {
        let mut paths: Vec<String> = drafts.iter().map(|d| d.path.clone()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn path_backend_finds_images_recursively() {
        let dir = fixture_tree();
        let drafts = PathBackend.scan(dir.path(), None).unwrap();
        assert_eq!(
            sorted_paths(&drafts),
            vec!["a.jpg", "sub/b.PNG", "sub/deep/c.gif"]
        );
    }

    #[test]
    fn both_backends_agree_on_the_same_tree() {
        let dir = fixture_tree();
        let from_paths = PathBackend.scan(dir.path(), None).unwrap();
        let from_handles = HandleBackend.scan(dir.path(), None).unwrap();
        assert_eq!(sorted_paths(&from_paths), sorted_paths(&from_handles));
    }

    #[test]
    fn drafts_carry_filesystem_facts_and_defaults() {
        let dir = fixture_tree();
        let drafts = PathBackend.scan(dir.path(), None).unwrap();
        let a = drafts.iter().find(|d| d.path == "a.jpg").unwrap();

        assert_eq!(a.name, "a.jpg");
        assert_eq!(a.size, 4);
        assert!(a.last_modified > 0);
        assert!(!a.directory_handle.is_empty());
        assert!(a.id.is_none());
        assert!(a.tags.is_empty());
        assert!(!a.favorite);
        assert!(a.date_added > 0);
    }

    #[test]
    fn missing_root_maps_to_not_found() {
        let err = PathBackend
            .scan(Path::new("/no/such/dir/anywhere"), None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = HandleBackend
            .scan(Path::new("/no/such/dir/anywhere"), None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn progress_callback_fires_per_image() {
        use std::cell::Cell;

        let dir = fixture_tree();
        let seen = Cell::new(0usize);
        let callback: &dyn Fn(usize) = &|count| seen.set(count);
        PathBackend.scan(dir.path(), Some(callback)).unwrap();
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn run_scan_merges_and_records_the_directory() {
        let dir = fixture_tree();
        let pool = crate::db::init_memory_database().unwrap();

        let found = run_scan(&PathBackend, dir.path(), &pool).unwrap();
        assert_eq!(found, 3);

        {
            let conn = pool.get().unwrap();
            assert_eq!(crate::db::list_images(&conn).unwrap().len(), 3);
            let dirs = crate::db::list_directories(&conn).unwrap();
            assert_eq!(dirs.len(), 1);
            assert_eq!(dirs[0].image_count, 3);
            assert!(dirs[0].last_scanned > 0);
        }

        // Re-scan is stable: same records, refreshed directory entry
        run_scan(&PathBackend, dir.path(), &pool).unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(crate::db::list_images(&conn).unwrap().len(), 3);
        assert_eq!(crate::db::list_directories(&conn).unwrap().len(), 1);
    }
}
