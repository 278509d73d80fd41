//! Moteur de roulement : ancrage, modèle de cycle et requêtes par date.
//!
//! Cycle de vie : `Uninitialized` à la construction, `Ready` après un
//! [`ScheduleEngine::init`] réussi. Les requêtes lisent un instantané
//! (`Arc`) du modèle ; une régénération en construit un nouveau hors verrou
//! puis le substitue d'un bloc, si bien qu'un lecteur voit toujours l'ancien
//! ou le nouveau modèle, jamais un état intermédiaire.

mod cell;
mod query;
mod regen;
mod types;
pub mod util;

pub use cell::EngineCell;
pub use types::{
    CycleInfo, Duty, EngineError, EngineState, RefreshEvent, RefreshListener, RefreshReason,
};

use crate::catalog::ShiftTypeCatalog;
use crate::config::{ConfigurationProvider, Preferences};
use crate::scheme::RotationScheme;
use crate::template::Template;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug, Clone)]
struct Snapshot {
    template: Arc<Template>,
    prefs: Preferences,
    /// Types actifs lus pour construire ce modèle.
    catalog_size: usize,
}

impl Snapshot {
    fn position_of(&self, date: NaiveDate) -> Option<usize> {
        let n = self.template.len();
        if n == 0 {
            return None;
        }
        let offset = util::days_between(self.template.anchor(), date);
        Some(util::normalized_mod(offset, n))
    }
}

pub struct ScheduleEngine {
    scheme: RotationScheme,
    catalog: Arc<ShiftTypeCatalog>,
    config: Option<Arc<dyn ConfigurationProvider>>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Sérialise les écrivains (initialisation, régénération).
    writer: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn RefreshListener>>>,
    generation: AtomicU64,
}

impl ScheduleEngine {
    pub fn new(
        catalog: Arc<ShiftTypeCatalog>,
        config: Option<Arc<dyn ConfigurationProvider>>,
    ) -> Self {
        Self::with_scheme(RotationScheme::standard(), catalog, config)
    }

    pub fn with_scheme(
        scheme: RotationScheme,
        catalog: Arc<ShiftTypeCatalog>,
        config: Option<Arc<dyn ConfigurationProvider>>,
    ) -> Self {
        Self {
            scheme,
            catalog,
            config,
            snapshot: RwLock::new(None),
            writer: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Charge la configuration et le catalogue puis construit le modèle.
    ///
    /// Idempotent : un moteur déjà prêt n'est pas reconstruit. Un échec de
    /// chargement du catalogue laisse le moteur non initialisé.
    pub fn init(&self) -> Result<(), EngineError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.current().is_some() {
            return Ok(());
        }

        let prefs = Preferences::resolve(self.config.as_deref());
        let types = self
            .catalog
            .load()
            .map_err(EngineError::CatalogUnavailable)?;
        let template = Template::build(&self.scheme, &types, prefs.anchor)?;

        tracing::info!(
            anchor = %prefs.anchor,
            cycle_length = template.len(),
            shift_types = types.len(),
            "schedule engine ready"
        );
        self.install(Snapshot {
            template: Arc::new(template),
            prefs,
            catalog_size: types.len(),
        });
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        if self.current().is_some() {
            EngineState::Ready
        } else {
            EngineState::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    pub fn scheme(&self) -> &RotationScheme {
        &self.scheme
    }

    pub fn catalog(&self) -> &ShiftTypeCatalog {
        &self.catalog
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        self.current().map(|s| s.template.anchor())
    }

    /// Modèle courant (partagé, immuable).
    pub fn template(&self) -> Option<Arc<Template>> {
        self.current().map(|s| Arc::clone(&s.template))
    }

    pub fn preferences(&self) -> Option<Preferences> {
        self.current().map(|s| s.prefs.clone())
    }

    /// Incrémenté à chaque reconstruction du modèle.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn subscribe(&self, listener: Arc<dyn RefreshListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, snapshot: Snapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
    }
}
