//! Cache à clé unique avec durée de vie, invalidation et rafraîchissement
//! en arrière-plan (stale-while-revalidate).
//!
//! Le cache ne connaît pas la source des données : l'appelant fournit le
//! chargeur, ce qui rend la politique testable sans stockage.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Résultat d'une consultation.
#[derive(Debug)]
pub enum Lookup<T> {
    Fresh(Arc<T>),
    /// Valeur expirée ou invalidée, encore utilisable en secours.
    Stale(Arc<T>),
    Missing,
}

/// Jeton de rafraîchissement ; un seul en circulation à la fois.
#[derive(Debug)]
#[must_use]
pub struct RefreshTicket {
    epoch: u64,
}

#[derive(Debug)]
struct Entry<T> {
    value: Option<Arc<T>>,
    loaded_at: Option<Instant>,
    invalidated: bool,
    refreshing: bool,
    epoch: u64,
}

#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: RwLock<Entry<T>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(Entry {
                value: None,
                loaded_at: None,
                invalidated: false,
                refreshing: false,
                epoch: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self) -> Lookup<T> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        self.classify(&entry)
    }

    /// Dernière valeur chargée avec succès, fraîche ou non.
    pub fn last_good(&self) -> Option<Arc<T>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    /// Enregistre une valeur fraîchement chargée.
    pub fn put(&self, value: T) -> Arc<T> {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        let value = Arc::new(value);
        entry.value = Some(Arc::clone(&value));
        entry.loaded_at = Some(Instant::now());
        entry.invalidated = false;
        value
    }

    /// Force le prochain accès à recharger ; la valeur reste disponible en secours.
    pub fn invalidate(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        entry.invalidated = true;
        entry.epoch += 1;
    }

    pub fn clear(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        entry.value = None;
        entry.loaded_at = None;
        entry.invalidated = false;
        entry.epoch += 1;
    }

    /// Réserve le rafraîchissement ; `None` si un autre est déjà en cours.
    pub fn try_begin_refresh(&self) -> Option<RefreshTicket> {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        if entry.refreshing {
            return None;
        }
        entry.refreshing = true;
        Some(RefreshTicket { epoch: entry.epoch })
    }

    /// Termine un rafraîchissement réussi.
    ///
    /// Une valeur chargée avant une invalidation survenue entre-temps est
    /// ignorée : elle pourrait précéder l'écriture qui a invalidé le cache.
    pub fn complete(&self, ticket: RefreshTicket, value: T) -> bool {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        entry.refreshing = false;
        if entry.epoch != ticket.epoch {
            return false;
        }
        entry.value = Some(Arc::new(value));
        entry.loaded_at = Some(Instant::now());
        entry.invalidated = false;
        true
    }

    /// Termine un rafraîchissement en échec ; l'ancienne valeur est conservée.
    pub fn abandon(&self, _ticket: RefreshTicket) {
        self.release_refresh();
    }

    /// Libère la réservation quand le jeton n'a pas pu être transmis.
    pub fn release_refresh(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        entry.refreshing = false;
    }

    /// Lecture bloquante : recharge si la valeur n'est pas fraîche et sert
    /// l'ancienne valeur si le chargement échoue.
    ///
    /// Si le cache est invalidé pendant le chargement, la valeur lue est
    /// renvoyée sans être mise en cache.
    pub fn get_or_load<E, F>(&self, loader: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let (stale, epoch) = {
            let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
            match self.classify(&entry) {
                Lookup::Fresh(v) => return Ok(v),
                Lookup::Stale(v) => (Some(v), entry.epoch),
                Lookup::Missing => (None, entry.epoch),
            }
        };
        match loader() {
            Ok(value) => {
                let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
                let value = Arc::new(value);
                if entry.epoch == epoch {
                    entry.value = Some(Arc::clone(&value));
                    entry.loaded_at = Some(Instant::now());
                    entry.invalidated = false;
                } else {
                    tracing::debug!("cache invalidated during load, value not kept");
                }
                Ok(value)
            }
            Err(err) => match stale {
                Some(v) => {
                    tracing::warn!(%err, "refresh failed, serving stale value");
                    Ok(v)
                }
                None => Err(err),
            },
        }
    }

    fn classify(&self, entry: &Entry<T>) -> Lookup<T> {
        let Some(value) = entry.value.clone() else {
            return Lookup::Missing;
        };
        let fresh = !entry.invalidated
            && entry.loaded_at.is_some_and(|at| at.elapsed() < self.ttl);
        if fresh {
            Lookup::Fresh(value)
        } else {
            Lookup::Stale(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_then_fresh() {
        let cache = TtlCache::new(Duration::from_secs(300));
        assert!(matches!(cache.lookup(), Lookup::Missing));
        cache.put(1);
        assert!(matches!(cache.lookup(), Lookup::Fresh(v) if *v == 1));
    }

    #[test]
    fn zero_ttl_is_always_stale() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.put("x");
        assert!(matches!(cache.lookup(), Lookup::Stale(_)));
    }

    #[test]
    fn invalidate_keeps_fallback_value() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.put(7);
        cache.invalidate();
        assert!(matches!(cache.lookup(), Lookup::Stale(v) if *v == 7));
        assert_eq!(cache.last_good().as_deref(), Some(&7));
        cache.clear();
        assert!(cache.last_good().is_none());
    }

    #[test]
    fn get_or_load_reads_through_once() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let mut calls = 0;
        let v = cache
            .get_or_load(|| {
                calls += 1;
                Ok::<_, String>(5)
            })
            .unwrap();
        assert_eq!(*v, 5);
        let v = cache.get_or_load(|| Err::<i32, _>("not called".to_string())).unwrap();
        assert_eq!(*v, 5);
        assert_eq!(calls, 1);
    }

    #[test]
    fn get_or_load_degrades_to_stale_or_fails() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(300));
        assert!(cache.get_or_load(|| Err("down".to_string())).is_err());
        cache.put(3);
        cache.invalidate();
        let v = cache.get_or_load(|| Err("down".to_string())).unwrap();
        assert_eq!(*v, 3);
    }

    #[test]
    fn only_one_refresh_in_flight() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.put(1);
        let ticket = cache.try_begin_refresh().unwrap();
        assert!(cache.try_begin_refresh().is_none());
        assert!(cache.complete(ticket, 2));
        assert_eq!(cache.last_good().as_deref(), Some(&2));
        let again = cache.try_begin_refresh().unwrap();
        cache.abandon(again);
        assert_eq!(cache.last_good().as_deref(), Some(&2));
    }

    #[test]
    fn refresh_racing_an_invalidation_is_discarded() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.put(1);
        let ticket = cache.try_begin_refresh().unwrap();
        cache.invalidate();
        assert!(!cache.complete(ticket, 99));
        assert!(matches!(cache.lookup(), Lookup::Stale(v) if *v == 1));
    }

    #[test]
    fn load_overtaken_by_invalidation_is_not_cached() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.put(vec![1, 2, 3]);
        cache.invalidate();
        let v = cache
            .get_or_load(|| {
                // écriture concurrente : lue avant, invalidée pendant
                cache.invalidate();
                Ok::<_, String>(vec![1, 2, 3])
            })
            .unwrap();
        assert_eq!(*v, [1, 2, 3]);
        assert!(matches!(cache.lookup(), Lookup::Stale(_)));

        let v = cache
            .get_or_load(|| Ok::<_, String>(vec![1, 2, 3, 4]))
            .unwrap();
        assert_eq!(v.len(), 4);
        assert!(matches!(cache.lookup(), Lookup::Fresh(v) if v.len() == 4));
    }
}
