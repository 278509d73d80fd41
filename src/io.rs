use crate::model::Day;
use csv::WriterBuilder;
use std::fs;
use std::path::Path;

/// Export JSON d'une liste de journées (jolie mise en forme)
pub fn export_month_json<P: AsRef<Path>>(path: P, days: &[Day]) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(days)?;
    fs::write(path, s)?;
    Ok(())
}

/// Export CSV : une ligne par poste, plus une ligne `rest` par journée.
/// Header `date,cycle_index,slot,shift,start,end,teams`
pub fn export_month_csv<P: AsRef<Path>>(path: P, days: &[Day]) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record(["date", "cycle_index", "slot", "shift", "start", "end", "teams"])?;
    for day in days {
        let date = day.date.to_string();
        let index = day.cycle_index.to_string();
        for (slot, shift) in day.shifts.iter().enumerate() {
            let start = shift.shift_type.start_time().format("%H:%M").to_string();
            let end = shift.shift_type.end_time().format("%H:%M").to_string();
            let slot = slot.to_string();
            w.write_record([
                date.as_str(),
                index.as_str(),
                slot.as_str(),
                shift.shift_type.name.as_str(),
                start.as_str(),
                end.as_str(),
                letters(&shift.teams).as_str(),
            ])?;
        }
        w.write_record([
            date.as_str(),
            index.as_str(),
            "",
            "rest",
            "",
            "",
            letters(&day.rest_teams).as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn letters(teams: &[crate::team::HalfTeam]) -> String {
    teams.iter().map(|t| t.letter()).collect()
}
