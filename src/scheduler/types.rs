use crate::catalog::CatalogError;
use crate::team::UnknownTeam;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("shift type catalog unavailable")]
    CatalogUnavailable(#[source] CatalogError),
    #[error("shift type catalog has no active shift type")]
    EmptyCatalog,
    #[error(transparent)]
    InvalidTeamName(#[from] UnknownTeam),
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),
    #[error("malformed rotation scheme: {0}")]
    MalformedScheme(String),
    #[error("invalid anchor date: {0}")]
    InvalidAnchor(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
}

/// Enregistrement de diagnostic du moteur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleInfo {
    pub cycle_length: usize,
    pub anchor_date: Option<NaiveDate>,
    pub template_size: usize,
    pub catalog_size: usize,
    /// Position du jour courant, `-1` si le moteur n'est pas prêt.
    pub current_cycle_position: i64,
}

/// Affectation d'une équipe pour une date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Duty {
    Slot(usize),
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    AnchorChanged,
    ShiftTypesChanged,
}

/// Signal émis après chaque reconstruction du modèle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEvent {
    pub generation: u64,
    pub reason: RefreshReason,
    pub previous_anchor: Option<NaiveDate>,
    pub anchor: NaiveDate,
}

/// Cache externe dépendant des journées générées.
pub trait RefreshListener: Send + Sync {
    fn schedule_refreshed(&self, event: &RefreshEvent);
}

impl<F> RefreshListener for F
where
    F: Fn(&RefreshEvent) + Send + Sync,
{
    fn schedule_refreshed(&self, event: &RefreshEvent) {
        self(event)
    }
}
