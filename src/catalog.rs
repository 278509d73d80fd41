use crate::cache::{Lookup, TtlCache};
use crate::model::{ShiftType, ShiftTypeId};
use crate::storage::ShiftTypeStore;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Durée de vie du cache du catalogue.
pub const CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("shift type not found: {0}")]
    NotFound(String),
    #[error("invalid shift type: {0}")]
    Invalid(&'static str),
    #[error("shift type name already used: {0}")]
    DuplicateName(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Comportement à l'expiration du cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Recharge sur le thread appelant.
    #[default]
    Blocking,
    /// Sert l'ancienne valeur et recharge sur un thread dédié.
    StaleWhileRevalidate,
}

/// Catalogue des types de poste, adossé à un [`ShiftTypeStore`].
pub struct ShiftTypeCatalog {
    store: Arc<dyn ShiftTypeStore>,
    cache: Arc<TtlCache<Vec<ShiftType>>>,
    mode: RefreshMode,
    seeded: Mutex<bool>,
}

impl ShiftTypeCatalog {
    pub fn new(store: Arc<dyn ShiftTypeStore>) -> Self {
        Self {
            store,
            cache: Arc::new(TtlCache::new(CATALOG_TTL)),
            mode: RefreshMode::default(),
            seeded: Mutex::new(false),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Arc::new(TtlCache::new(ttl));
        self
    }

    pub fn with_refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    /// Chargement strict : échoue si le stockage est indisponible et
    /// qu'aucune valeur n'a jamais été chargée.
    pub fn load(&self) -> Result<Arc<Vec<ShiftType>>, CatalogError> {
        let types = self.cache.get_or_load(|| {
            self.ensure_seeded()?;
            fetch_active(self.store.as_ref())
        })?;
        Ok(types)
    }

    /// Types actifs triés par (nom, id). Ne renvoie jamais d'erreur :
    /// valeur périmée en secours, sinon liste vide.
    pub fn get_all(&self) -> Arc<Vec<ShiftType>> {
        match self.cache.lookup() {
            Lookup::Fresh(types) => types,
            Lookup::Stale(types) if self.mode == RefreshMode::StaleWhileRevalidate => {
                self.spawn_refresh();
                types
            }
            Lookup::Stale(_) | Lookup::Missing => self.load().unwrap_or_else(|err| {
                tracing::warn!(%err, "shift type catalog unavailable");
                Arc::new(Vec::new())
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.get_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_by_index(&self, index: usize) -> Result<ShiftType, CatalogError> {
        self.get_all()
            .get(index)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("index {index}")))
    }

    pub fn get_by_name(&self, name: &str) -> Result<ShiftType, CatalogError> {
        self.get_all()
            .iter()
            .find(|t| t.has_name(name))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    /// Insère (sans id) ou met à jour (avec id) un type de poste.
    pub fn save(&self, mut shift_type: ShiftType) -> Result<ShiftType, CatalogError> {
        shift_type.name = shift_type.name.trim().to_string();
        shift_type.validate().map_err(CatalogError::Invalid)?;

        if let Some(existing) = self.store.find_by_name(&shift_type.name)? {
            if existing.id != shift_type.id {
                return Err(CatalogError::DuplicateName(shift_type.name));
            }
        }

        let now = Utc::now();
        let saved = match shift_type.id {
            None => {
                shift_type.created_at = now;
                shift_type.updated_at = now;
                self.store.insert(shift_type)?
            }
            Some(id) => {
                let current = self
                    .store
                    .find(id)?
                    .ok_or_else(|| CatalogError::NotFound(format!("id {id}")))?;
                shift_type.created_at = current.created_at;
                shift_type.updated_at = now;
                self.store.update(&shift_type)?;
                shift_type
            }
        };
        self.cache.invalidate();
        tracing::debug!(name = %saved.name, id = ?saved.id, "shift type saved");
        Ok(saved)
    }

    /// Suppression logique : l'historique garde ses références.
    pub fn soft_delete(&self, id: ShiftTypeId) -> Result<(), CatalogError> {
        if !self.store.deactivate(id)? {
            return Err(CatalogError::NotFound(format!("id {id}")));
        }
        self.cache.invalidate();
        tracing::debug!(%id, "shift type deactivated");
        Ok(())
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Sème les types par défaut dans un stockage vide, ou complète un
    /// amorçage interrompu (stockage ne contenant que des types par défaut).
    fn ensure_seeded(&self) -> anyhow::Result<()> {
        let mut seeded = self.seeded.lock().unwrap_or_else(PoisonError::into_inner);
        if *seeded {
            return Ok(());
        }
        let rows = self.store.list_all()?;
        let defaults = ShiftType::defaults();
        let only_defaults = rows
            .iter()
            .all(|r| !r.is_user_defined && defaults.iter().any(|d| r.has_name(&d.name)));
        if only_defaults {
            let missing: Vec<ShiftType> = defaults
                .into_iter()
                .filter(|d| !rows.iter().any(|r| r.has_name(&d.name)))
                .collect();
            if !missing.is_empty() {
                let count = missing.len();
                self.store.insert_many(missing)?;
                tracing::info!(count, "seeded default shift types");
            }
        }
        *seeded = true;
        Ok(())
    }

    fn spawn_refresh(&self) {
        let Some(ticket) = self.cache.try_begin_refresh() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let spawned = thread::Builder::new()
            .name("shift-type-refresh".into())
            .spawn(move || match fetch_active(store.as_ref()) {
                Ok(types) => {
                    if cache.complete(ticket, types) {
                        tracing::debug!("shift type cache refreshed");
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "background refresh failed");
                    cache.abandon(ticket);
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(%err, "could not spawn refresh thread");
            self.cache.release_refresh();
        }
    }
}

fn fetch_active(store: &dyn ShiftTypeStore) -> anyhow::Result<Vec<ShiftType>> {
    let mut types = store.list_active()?;
    types.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;

    /// Stockage mémoire dont les lectures peuvent être coupées.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        down: AtomicBool,
        reads: AtomicUsize,
        /// Nombre d'insertions acceptées avant échec (0 : illimité).
        insert_limit: AtomicUsize,
        inserts: AtomicUsize,
        /// Suspend la prochaine lecture après qu'elle a lu les lignes.
        pause: Mutex<Option<(Arc<Barrier>, Arc<Barrier>)>>,
    }

    impl ShiftTypeStore for FlakyStore {
        fn list_all(&self) -> anyhow::Result<Vec<ShiftType>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("store offline");
            }
            let rows = self.inner.list_all()?;
            let pause = self.pause.lock().unwrap().take();
            if let Some((read_done, resume)) = pause {
                read_done.wait();
                resume.wait();
            }
            Ok(rows)
        }
        fn insert(&self, shift_type: ShiftType) -> anyhow::Result<ShiftType> {
            let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
            let limit = self.insert_limit.load(Ordering::SeqCst);
            if limit != 0 && n > limit {
                anyhow::bail!("disk full");
            }
            self.inner.insert(shift_type)
        }
        fn update(&self, shift_type: &ShiftType) -> anyhow::Result<()> {
            self.inner.update(shift_type)
        }
    }

    fn catalog() -> (Arc<FlakyStore>, ShiftTypeCatalog) {
        let store = Arc::new(FlakyStore::default());
        let catalog = ShiftTypeCatalog::new(store.clone());
        (store, catalog)
    }

    #[test]
    fn first_load_seeds_three_defaults_sorted_by_name() {
        let (store, catalog) = catalog();
        let names: Vec<String> = catalog.get_all().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["Afternoon", "Morning", "Night"]);
        assert_eq!(store.inner.count().unwrap(), 3);
    }

    #[test]
    fn seeding_does_not_repeat_after_deletions() {
        let (store, catalog) = catalog();
        for t in catalog.load().unwrap().iter() {
            catalog.soft_delete(t.id.unwrap()).unwrap();
        }
        assert!(catalog.get_all().is_empty());
        assert_eq!(store.inner.count().unwrap(), 3);
    }

    #[test]
    fn cached_reads_do_not_hit_store() {
        let (store, catalog) = catalog();
        catalog.load().unwrap();
        let before = store.reads.load(Ordering::SeqCst);
        catalog.get_all();
        catalog.get_by_name("night").unwrap();
        assert_eq!(store.reads.load(Ordering::SeqCst), before);
    }

    #[test]
    fn first_load_failure_is_an_error() {
        let (store, catalog) = catalog();
        store.down.store(true, Ordering::SeqCst);
        assert!(matches!(catalog.load(), Err(CatalogError::Storage(_))));
        assert!(catalog.get_all().is_empty());
    }

    #[test]
    fn later_failure_serves_stale_value() {
        let (store, catalog) = catalog();
        catalog.load().unwrap();
        catalog.invalidate();
        store.down.store(true, Ordering::SeqCst);
        assert_eq!(catalog.get_all().len(), 3);
        assert_eq!(catalog.load().unwrap().len(), 3);
    }

    #[test]
    fn save_inserts_updates_and_invalidates() {
        let (_store, catalog) = catalog();
        catalog.load().unwrap();
        let created = catalog
            .save(ShiftType::new("Day", 8, 30, 600, "#00AA00"))
            .unwrap();
        assert!(created.is_user_defined);
        assert_eq!(catalog.get_all().len(), 4);

        let mut edited = catalog.get_by_name("DAY").unwrap();
        let created_at = edited.created_at;
        edited.description = "long day".into();
        let updated = catalog.save(edited).unwrap();
        assert_eq!(updated.created_at, created_at);
        assert!(updated.updated_at >= created_at);
        assert_eq!(catalog.get_by_name("day").unwrap().description, "long day");
    }

    #[test]
    fn save_rejects_invalid_and_duplicate() {
        let (_store, catalog) = catalog();
        catalog.load().unwrap();
        let bad = ShiftType::new("Broken", 25, 0, 60, "#000000");
        assert!(matches!(catalog.save(bad), Err(CatalogError::Invalid(_))));
        let dup = ShiftType::new("morning", 6, 0, 60, "#000000");
        assert!(matches!(catalog.save(dup), Err(CatalogError::DuplicateName(_))));
        let mut ghost = ShiftType::new("Ghost", 6, 0, 60, "#000000");
        ghost.id = Some(ShiftTypeId::new(42));
        assert!(matches!(catalog.save(ghost), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn lookups_report_not_found() {
        let (_store, catalog) = catalog();
        assert!(catalog.get_by_index(2).is_ok());
        assert!(matches!(catalog.get_by_index(3), Err(CatalogError::NotFound(_))));
        assert!(matches!(catalog.get_by_name("Evening"), Err(CatalogError::NotFound(_))));
        assert!(matches!(
            catalog.soft_delete(ShiftTypeId::new(77)),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn stale_while_revalidate_serves_old_value_immediately() {
        let store = Arc::new(FlakyStore::default());
        let catalog = ShiftTypeCatalog::new(store.clone())
            .with_ttl(Duration::ZERO)
            .with_refresh_mode(RefreshMode::StaleWhileRevalidate);
        assert_eq!(catalog.load().unwrap().len(), 3);
        store
            .inner
            .insert(ShiftType::new("Extra", 9, 0, 60, "#123456"))
            .unwrap();
        // l'ancienne valeur est servie pendant le rafraîchissement
        let served = catalog.get_all();
        assert!(served.len() == 3 || served.len() == 4);
        for _ in 0..200 {
            if catalog.cache.last_good().map(|v| v.len()) == Some(4) {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("background refresh never completed");
    }

    #[test]
    fn interrupted_seeding_is_completed_on_retry() {
        let (store, catalog) = catalog();
        store.insert_limit.store(1, Ordering::SeqCst);
        assert!(catalog.load().is_err());
        assert_eq!(store.inner.count().unwrap(), 1);

        store.insert_limit.store(0, Ordering::SeqCst);
        let names: Vec<String> = catalog.load().unwrap().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["Afternoon", "Morning", "Night"]);
    }

    #[test]
    fn user_rows_block_reseeding() {
        let (store, catalog) = catalog();
        store
            .inner
            .insert(ShiftType::new("Custom", 7, 0, 600, "#ABCDEF"))
            .unwrap();
        let names: Vec<String> = catalog.load().unwrap().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["Custom"]);
    }

    #[test]
    fn save_during_reload_is_not_lost() {
        let (store, catalog) = catalog();
        let catalog = Arc::new(catalog);
        catalog.load().unwrap();
        catalog.invalidate();

        let read_done = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        *store.pause.lock().unwrap() = Some((Arc::clone(&read_done), Arc::clone(&resume)));

        let reader = {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || catalog.get_all().len())
        };
        read_done.wait();
        catalog
            .save(ShiftType::new("Relief", 9, 0, 240, "#AA00AA"))
            .unwrap();
        resume.wait();
        assert_eq!(reader.join().unwrap(), 3);

        let names: Vec<String> = catalog.get_all().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["Afternoon", "Morning", "Night", "Relief"]);
    }
}
