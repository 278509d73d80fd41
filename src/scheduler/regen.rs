use super::{EngineError, RefreshEvent, RefreshReason, ScheduleEngine, Snapshot};
use crate::config::{AnchorConfiguration, ConfigurationProvider, Preferences, Toggle};
use crate::team::{HalfTeam, TeamRegistry};
use crate::template::Template;
use chrono::NaiveDate;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};

impl ScheduleEngine {
    /// Nouvel ancrage : le modèle est reconstruit entièrement, substitué
    /// d'un bloc, et les écouteurs sont prévenus.
    ///
    /// Sur un moteur non initialisé, tient lieu d'initialisation.
    pub fn regenerate_scheme_with_new_date(&self, anchor: NaiveDate) -> Result<(), EngineError> {
        let event = {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = self.current();
            let mut prefs = match &previous {
                Some(s) => s.prefs.clone(),
                None => Preferences::resolve(self.config.as_deref()),
            };
            prefs.anchor = anchor;

            let types = self
                .catalog
                .load()
                .map_err(EngineError::CatalogUnavailable)?;
            let template = Template::build(&self.scheme, &types, anchor)?;

            if let Some(config) = &self.config {
                if let Err(err) = config.set_anchor(AnchorConfiguration::from_date(anchor)) {
                    tracing::warn!(error = %format!("{err:#}"), "anchor not persisted");
                }
            }

            self.install(Snapshot {
                template: Arc::new(template),
                prefs,
                catalog_size: types.len(),
            });
            let previous_anchor = previous.map(|s| s.template.anchor());
            tracing::info!(%anchor, ?previous_anchor, "rotation scheme regenerated");
            self.next_event(RefreshReason::AnchorChanged, previous_anchor, anchor)
        };
        self.notify(&event);
        Ok(())
    }

    /// Même chose à partir d'un triplet jour/mois/année.
    pub fn update_scheme_date(&self, day: u32, month: u32, year: i32) -> Result<(), EngineError> {
        let anchor = AnchorConfiguration { day, month, year };
        let date = anchor
            .to_date()
            .ok_or_else(|| EngineError::InvalidAnchor(format!("{year}-{month}-{day}")))?;
        self.regenerate_scheme_with_new_date(date)
    }

    /// Reconstruit le modèle après une modification du catalogue.
    pub fn refresh_shift_types(&self) -> Result<(), EngineError> {
        let event = {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(previous) = self.current() else {
                return Err(EngineError::PreconditionViolation("engine not initialized"));
            };
            let anchor = previous.template.anchor();
            let types = self
                .catalog
                .load()
                .map_err(EngineError::CatalogUnavailable)?;
            let template = Template::build(&self.scheme, &types, anchor)?;
            self.install(Snapshot {
                template: Arc::new(template),
                prefs: previous.prefs.clone(),
                catalog_size: types.len(),
            });
            self.next_event(RefreshReason::ShiftTypesChanged, Some(anchor), anchor)
        };
        self.notify(&event);
        Ok(())
    }

    /// Choix de « mon équipe » : présentation uniquement, le modèle est
    /// conservé tel quel.
    pub fn set_my_team(&self, team: HalfTeam) -> Result<(), EngineError> {
        self.update_prefs(|p| p.my_team = team)?;
        self.persist(|c| c.set_team_index(team.index() as i64));
        Ok(())
    }

    pub fn set_my_team_letter(&self, letter: char) -> Result<(), EngineError> {
        let team = TeamRegistry::global().resolve(letter)?;
        self.set_my_team(team)
    }

    pub fn set_toggle(&self, toggle: Toggle, value: bool) -> Result<(), EngineError> {
        self.update_prefs(|p| {
            p.toggles.insert(toggle, value);
        })?;
        self.persist(|c| c.set_toggle(toggle, value));
        Ok(())
    }

    fn update_prefs(&self, f: impl FnOnce(&mut Preferences)) -> Result<(), EngineError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = self.current() else {
            return Err(EngineError::PreconditionViolation("engine not initialized"));
        };
        let mut prefs = current.prefs.clone();
        f(&mut prefs);
        self.install(Snapshot {
            template: Arc::clone(&current.template),
            prefs,
            catalog_size: current.catalog_size,
        });
        Ok(())
    }

    fn persist(
        &self,
        write: impl FnOnce(&dyn ConfigurationProvider) -> anyhow::Result<()>,
    ) {
        if let Some(config) = &self.config {
            if let Err(err) = write(config.as_ref()) {
                tracing::warn!(error = %format!("{err:#}"), "preference not persisted");
            }
        }
    }

    fn next_event(
        &self,
        reason: RefreshReason,
        previous_anchor: Option<NaiveDate>,
        anchor: NaiveDate,
    ) -> RefreshEvent {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        RefreshEvent {
            generation,
            reason,
            previous_anchor,
            anchor,
        }
    }

    fn notify(&self, event: &RefreshEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.schedule_refreshed(event);
        }
    }
}
