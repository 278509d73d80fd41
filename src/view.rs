//! Filtres d'affichage appliqués après le calcul : ils masquent ou
//! soulignent, sans jamais modifier l'affectation des équipes.

use crate::config::{Preferences, Toggle};
use crate::model::Day;
use crate::scheduler::Duty;
use crate::team::HalfTeam;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ShiftView {
    pub slot: usize,
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub color: String,
    pub teams: Vec<HalfTeam>,
    pub mine: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub cycle_index: usize,
    pub shifts: Vec<ShiftView>,
    pub rest_teams: Option<Vec<HalfTeam>>,
    pub my_duty: Option<Duty>,
}

#[derive(Debug, Clone)]
pub struct DisplayFilter {
    prefs: Preferences,
}

impl DisplayFilter {
    pub fn new(prefs: Preferences) -> Self {
        Self { prefs }
    }

    pub fn apply(&self, day: &Day) -> DayView {
        let highlight = self.prefs.is_enabled(Toggle::HighlightMyTeam);
        let mine = self.prefs.my_team;
        let shifts = day
            .shifts
            .iter()
            .enumerate()
            .filter(|(slot, _)| Toggle::for_slot(*slot).map_or(true, |t| self.prefs.is_enabled(t)))
            .map(|(slot, shift)| ShiftView {
                slot,
                name: shift.shift_type.name.clone(),
                start: shift.shift_type.start_time(),
                end: shift.shift_type.end_time(),
                color: shift.shift_type.color.clone(),
                teams: shift.teams.clone(),
                mine: highlight && shift.has_team(mine),
            })
            .collect();
        DayView {
            date: day.date,
            cycle_index: day.cycle_index,
            shifts,
            rest_teams: self
                .prefs
                .is_enabled(Toggle::ShowRest)
                .then(|| day.rest_teams.clone()),
            my_duty: highlight.then(|| day.slot_of(mine).map_or(Duty::Rest, Duty::Slot)),
        }
    }
}

impl fmt::Display for DayView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{:02}", self.date, self.cycle_index)?;
        for shift in &self.shifts {
            write!(
                f,
                " | {} {}-{} {}{}",
                shift.name,
                shift.start.format("%H:%M"),
                shift.end.format("%H:%M"),
                letters(&shift.teams),
                if shift.mine { " *" } else { "" }
            )?;
        }
        if let Some(rest) = &self.rest_teams {
            write!(f, " | rest {}", letters(rest))?;
        }
        Ok(())
    }
}

fn letters(teams: &[HalfTeam]) -> String {
    teams.iter().map(|t| t.letter()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShiftType;
    use crate::scheme::RotationScheme;
    use crate::template::Template;

    fn first_day() -> Day {
        let anchor = NaiveDate::from_ymd_opt(2018, 11, 7).unwrap();
        let t = Template::build(&RotationScheme::standard(), &ShiftType::defaults(), anchor)
            .unwrap();
        t.day(0).unwrap().clone()
    }

    #[test]
    fn hiding_a_slot_does_not_move_teams() {
        let mut prefs = Preferences::default();
        prefs.toggles.insert(Toggle::ShowMorning, false);
        let view = DisplayFilter::new(prefs).apply(&first_day());
        assert_eq!(view.shifts.len(), 2);
        assert_eq!(view.shifts[0].slot, 1);
        assert_eq!(letters(&view.shifts[0].teams), "CD");
    }

    #[test]
    fn my_team_is_highlighted() {
        let mut prefs = Preferences::default();
        prefs.my_team = crate::team::TeamRegistry::global().resolve('D').unwrap();
        let view = DisplayFilter::new(prefs).apply(&first_day());
        assert_eq!(view.my_duty, Some(Duty::Slot(1)));
        assert!(view.shifts[1].mine);
        assert!(!view.shifts[0].mine);
        assert_eq!(
            view.to_string(),
            "2018-11-07 #00 | Morning 05:00-13:00 AB | Afternoon 13:00-21:00 CD * | Night 21:00-05:00 EF | rest GHI"
        );
    }

    #[test]
    fn rest_hidden_when_toggled_off() {
        let mut prefs = Preferences::default();
        prefs.toggles.insert(Toggle::ShowRest, false);
        prefs.toggles.insert(Toggle::HighlightMyTeam, false);
        let view = DisplayFilter::new(prefs).apply(&first_day());
        assert!(view.rest_teams.is_none());
        assert!(view.my_duty.is_none());
    }
}
