//! Filesystem watcher: surfaces image-file changes under a scanned root so
//! the host can decide to re-scan. Events carry paths only; no records are
//! touched here, since explicit deletion stays the single removal path.

use crate::error::{Error, Result};
use crate::thumbnails;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum FsEvent {
    /// An image file was created or modified.
    Changed(PathBuf),
    /// An image file was removed.
    Removed(PathBuf),
}

/// Handle to a running recursive watch. Dropping it stops the watch and
/// closes the event channel.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    pub fn start(root: &Path) -> Result<(Self, Receiver<FsEvent>)> {
        let (tx, rx) = unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => forward_event(&tx, event),
                Err(err) => log::warn!("watcher error: {err}"),
            }
        })
        .map_err(|err| Error::Init(format!("failed to create watcher: {err}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|err| Error::Init(format!("failed to watch {}: {err}", root.display())))?;
        log::info!("Watching {} for changes", root.display());

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn forward_event(tx: &Sender<FsEvent>, event: notify::Event) {
    for path in &event.paths {
        // Directories and non-image files are noise here. Removed files no
        // longer stat, so the extension check is the only filter for them.
        if path.is_dir() || !thumbnails::is_supported_image(path) {
            continue;
        }
        let forwarded = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => FsEvent::Changed(path.clone()),
            EventKind::Remove(_) => FsEvent::Removed(path.clone()),
            _ => continue,
        };
        let _ = tx.send(forwarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for<F: Fn(&FsEvent) -> bool>(rx: &Receiver<FsEvent>, accept: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
                if accept(&event) {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn detects_new_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let (watcher, rx) = FsWatcher::start(dir.path()).unwrap();
        std::thread::sleep(Duration::from_millis(300));

        std::fs::write(dir.path().join("new_meme.jpg"), b"fake").unwrap();

        assert!(wait_for(&rx, |ev| matches!(ev, FsEvent::Changed(p) if p.ends_with("new_meme.jpg"))));
        drop(watcher);
    }

    #[test]
    fn ignores_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        let (watcher, rx) = FsWatcher::start(dir.path()).unwrap();
        std::thread::sleep(Duration::from_millis(300));

        std::fs::write(dir.path().join("readme.txt"), b"hello").unwrap();

        std::thread::sleep(Duration::from_millis(500));
        assert!(rx.try_recv().is_err(), "no event expected for non-image file");
        drop(watcher);
    }

    #[test]
    fn detects_removed_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("old.png");
        std::fs::write(&target, b"fake").unwrap();

        let (watcher, rx) = FsWatcher::start(dir.path()).unwrap();
        std::thread::sleep(Duration::from_millis(300));

        std::fs::remove_file(&target).unwrap();

        assert!(wait_for(&rx, |ev| matches!(ev, FsEvent::Removed(_))));
        drop(watcher);
    }

    #[test]
    fn start_fails_for_missing_root() {
        assert!(FsWatcher::start(Path::new("/no/such/dir/anywhere")).is_err());
    }
}
