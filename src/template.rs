use crate::model::{Day, Shift, ShiftType};
use crate::scheduler::EngineError;
use crate::scheme::RotationScheme;
use chrono::{Days, NaiveDate};
use std::sync::Arc;

/// Les N journées du cycle, construites une fois et jamais modifiées.
///
/// La journée d'indice `i` est datée `anchor + i` ; les requêtes en font
/// une copie en remplaçant seulement la date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    anchor: NaiveDate,
    days: Vec<Day>,
}

impl Template {
    pub fn build(
        scheme: &RotationScheme,
        shift_types: &[ShiftType],
        anchor: NaiveDate,
    ) -> Result<Template, EngineError> {
        let slots = slot_types(shift_types, scheme.slots_per_day())?;
        let mut days = Vec::with_capacity(scheme.cycle_length());

        for index in 0..scheme.cycle_length() {
            let date = anchor
                .checked_add_days(Days::new(index as u64))
                .ok_or_else(|| EngineError::InvalidAnchor(format!("{anchor} + {index} days")))?;
            let shifts = slots
                .iter()
                .enumerate()
                .map(|(slot, shift_type)| {
                    Shift::new(Arc::clone(shift_type), scheme.slot_teams(index, slot).to_vec())
                })
                .collect();
            days.push(Day {
                date,
                cycle_index: index,
                shifts,
                rest_teams: scheme.rest_teams(index).to_vec(),
            });
        }

        Ok(Template { anchor, days })
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, index: usize) -> Option<&Day> {
        self.days.get(index)
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    /// Même affectation d'équipes jour par jour, quelles que soient les dates.
    pub fn same_assignments(&self, other: &Template) -> bool {
        self.days.len() == other.days.len()
            && self.days.iter().zip(&other.days).all(|(a, b)| {
                a.rest_teams == b.rest_teams
                    && a.shifts.len() == b.shifts.len()
                    && a.shifts.iter().zip(&b.shifts).all(|(x, y)| x.teams == y.teams)
            })
    }
}

/// Type de poste de chaque créneau.
///
/// Les types travaillés passent avant les types de repos, puis par heure de
/// début ; le créneau `s` prend l'entrée `s mod len`.
pub fn slot_types(
    shift_types: &[ShiftType],
    slots: usize,
) -> Result<Vec<Arc<ShiftType>>, EngineError> {
    let mut ordered: Vec<&ShiftType> = shift_types.iter().filter(|t| t.is_active).collect();
    if ordered.is_empty() {
        return Err(EngineError::EmptyCatalog);
    }
    ordered.sort_by_key(|t| (t.is_rest_type, t.start_hour, t.start_minute, t.id));
    let shared: Vec<Arc<ShiftType>> = ordered.into_iter().cloned().map(Arc::new).collect();
    Ok((0..slots).map(|s| Arc::clone(&shared[s % shared.len()])).collect())
}
