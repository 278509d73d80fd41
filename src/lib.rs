#![forbid(unsafe_code)]
//! Roulement : moteur de planning « 4/2 » pour 9 demi-équipes (A à I).
//!
//! - Schéma constant de 18 jours × 3 postes, ancré sur une date (jour 0).
//! - Catalogue de types de poste persisté, lu à travers un cache (TTL 5 min).
//! - Requêtes par date ou par mois : arithmétique de décalage cyclique sur un
//!   modèle construit une fois ; chaque résultat est une copie datée.
//! - Dates calendaires locales uniquement, sans fuseau.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod io;
pub mod model;
pub mod scheduler;
pub mod scheme;
pub mod storage;
pub mod team;
pub mod template;
pub mod view;

pub use catalog::{CatalogError, RefreshMode, ShiftTypeCatalog};
pub use config::{
    AnchorConfiguration, ConfigurationProvider, JsonConfig, MemoryConfig, Preferences, Toggle,
};
pub use model::{Day, Shift, ShiftType, ShiftTypeId};
pub use scheduler::{
    CycleInfo, Duty, EngineCell, EngineError, EngineState, RefreshEvent, RefreshListener,
    RefreshReason, ScheduleEngine,
};
pub use scheme::{RotationScheme, CYCLE_LENGTH, SLOTS_PER_DAY};
pub use storage::{JsonStore, MemoryStore, ShiftTypeStore};
pub use team::{HalfTeam, TeamRegistry, UnknownTeam};
pub use template::Template;
pub use view::{DayView, DisplayFilter};
