use std::sync::Arc;

use crate::{
    clock::{Clock, IdGenerator},
    db::{DbPool, OrmConn},
    preview::{PreviewCache, PreviewStore},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub previews: PreviewCache,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        orm: OrmConn,
        store: Arc<dyn PreviewStore>,
        preview_ttl: chrono::Duration,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            pool,
            orm,
            previews: PreviewCache::new(store, preview_ttl),
            clock,
            ids,
        }
    }
}
