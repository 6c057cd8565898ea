// Application context: the services every driver gets handed
//
// Progress trackers, ETag versions, and the filter-option cache are
// constructed once here and injected; nothing in the engine reaches for a
// process global. Lifecycle is the application's lifecycle.

use crate::cache::EtagRegistry;
use crate::config::Config;
use crate::db::filters::FilterOptionsCache;
use crate::progress::Trackers;

pub struct AppContext {
    pub config: Config,
    pub trackers: Trackers,
    pub etags: EtagRegistry,
    pub filter_options: FilterOptionsCache,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            trackers: Trackers::new(),
            etags: EtagRegistry::new(),
            filter_options: FilterOptionsCache::new(),
        }
    }

    /// Everything a curation edit makes stale.
    pub fn invalidate_on_curation(&self) {
        self.etags.invalidate_on_curation();
        self.filter_options.invalidate();
    }

    /// Everything an ingest completion makes stale.
    pub fn invalidate_on_import(&self) {
        self.etags.invalidate_on_import();
        self.filter_options.invalidate();
    }

    /// Curation entry point: update the row, then invalidate the derived
    /// views that render curation state.
    pub fn curate_photo(
        &self,
        conn: &rusqlite::Connection,
        file_path: &str,
        is_curated: bool,
        is_trashed: bool,
        rating: i64,
    ) -> crate::error::Result<()> {
        crate::db::photos::update_curation(conn, file_path, is_curated, is_trashed, rating)?;
        self.invalidate_on_curation();
        Ok(())
    }
}
