use super::{EngineError, ScheduleEngine};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Emplacement partagé : le premier appelant construit et initialise le
/// moteur, les suivants reçoivent la même instance.
///
/// Un échec d'initialisation ne remplit pas l'emplacement ; l'appel suivant
/// retente.
#[derive(Default)]
pub struct EngineCell {
    engine: OnceLock<Arc<ScheduleEngine>>,
    init: Mutex<()>,
}

impl EngineCell {
    pub const fn new() -> Self {
        Self {
            engine: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<Arc<ScheduleEngine>> {
        self.engine.get().cloned()
    }

    pub fn get_or_init<F>(&self, make: F) -> Result<Arc<ScheduleEngine>, EngineError>
    where
        F: FnOnce() -> ScheduleEngine,
    {
        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(make());
        engine.init()?;
        Ok(Arc::clone(self.engine.get_or_init(|| engine)))
    }
}
