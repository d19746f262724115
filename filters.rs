use crate::db;
use crate::error::Result;
use crate::models::{FilterState, ImageRecord, SortDir, SortKey, TagMatchMode};
use rusqlite::Connection;

/// Applies search, tag and favorite filters (AND-composed) and the chosen
/// sort to the full image set. The sort is stable: ties keep input order.
pub fn filter_and_sort(images: &[ImageRecord], state: &FilterState) -> Vec<ImageRecord> {
    let query = state.search.to_lowercase();

    let mut filtered: Vec<ImageRecord> = images
        .iter()
        .filter(|img| query.is_empty() || img.name.to_lowercase().contains(&query))
        .filter(|img| {
            if state.tags.is_empty() {
                return true;
            }
            match state.tag_mode {
                TagMatchMode::All => state.tags.iter().all(|t| img.has_tag(t)),
                TagMatchMode::Any => state.tags.iter().any(|t| img.has_tag(t)),
            }
        })
        .filter(|img| !state.favorites_only || img.favorite)
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let ordering = match state.sort_by {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Date => a.last_modified.cmp(&b.last_modified),
            SortKey::Size => a.size.cmp(&b.size),
        };
        match state.sort_dir {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    });

    filtered
}

/// In-memory working set over the image table plus a derived filtered view.
/// The view recomputes fully on read whenever the set or the filter changed
/// since the last read, tracked with a version counter. The store stays
/// authoritative; `refresh` must only run after pending writes completed.
pub struct Library {
    images: Vec<ImageRecord>,
    filter: FilterState,
    version: u64,
    cached: Option<CachedView>,
}

struct CachedView {
    version: u64,
    images: Vec<ImageRecord>,
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Library {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            filter: FilterState::default(),
            version: 0,
            cached: None,
        }
    }

    /// Reloads the working set from the store.
    pub fn refresh(&mut self, conn: &Connection) -> Result<()> {
        self.images = db::list_images(conn)?;
        self.version += 1;
        Ok(())
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.version += 1;
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn all(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn filtered(&mut self) -> &[ImageRecord] {
        let stale = self
            .cached
            .as_ref()
            .map(|c| c.version != self.version)
            .unwrap_or(true);
        if stale {
            self.cached = Some(CachedView {
                version: self.version,
                images: filter_and_sort(&self.images, &self.filter),
            });
        }
        match &self.cached {
            Some(cached) => &cached.images,
            None => &[],
        }
    }
}
