#![forbid(unsafe_code)]
use chrono::NaiveDate;
use roulement::{
    EngineError, EngineState, JsonStore, MemoryStore, ScheduleEngine, ShiftType,
    ShiftTypeCatalog, ShiftTypeStore,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[derive(Default)]
struct SwitchableStore {
    inner: MemoryStore,
    down: AtomicBool,
    reads: AtomicUsize,
}

impl ShiftTypeStore for SwitchableStore {
    fn list_all(&self) -> anyhow::Result<Vec<ShiftType>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("database locked");
        }
        self.inner.list_all()
    }
    fn insert(&self, shift_type: ShiftType) -> anyhow::Result<ShiftType> {
        self.inner.insert(shift_type)
    }
    fn update(&self, shift_type: &ShiftType) -> anyhow::Result<()> {
        self.inner.update(shift_type)
    }
}

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 11, 7).unwrap()
}

#[test]
fn first_load_failure_leaves_engine_uninitialized() {
    let store = Arc::new(SwitchableStore::default());
    store.down.store(true, Ordering::SeqCst);
    let engine = ScheduleEngine::new(Arc::new(ShiftTypeCatalog::new(store.clone())), None);

    let err = engine.init().unwrap_err();
    assert!(matches!(err, EngineError::CatalogUnavailable(_)));
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert_eq!(engine.day_in_cycle(anchor()), -1);
    assert!(engine.shifts_for_month(anchor()).is_empty());

    store.down.store(false, Ordering::SeqCst);
    engine.init().unwrap();
    assert_eq!(engine.day_in_cycle(anchor()), 0);
}

#[test]
fn later_failure_regenerates_from_stale_catalog() {
    let store = Arc::new(SwitchableStore::default());
    let catalog = Arc::new(ShiftTypeCatalog::new(store.clone()));
    let engine = ScheduleEngine::new(Arc::clone(&catalog), None);
    engine.init().unwrap();

    catalog.invalidate();
    store.down.store(true, Ordering::SeqCst);
    engine
        .regenerate_scheme_with_new_date(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap())
        .unwrap();
    assert_eq!(engine.cycle_info_at(anchor()).catalog_size, 3);
    assert_eq!(engine.day_by_date(anchor()).unwrap().shifts.len(), 3);
}

#[test]
fn json_backed_catalog_seeds_once_across_processes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shift-types.json");

    let first = ShiftTypeCatalog::new(Arc::new(JsonStore::open(&path).unwrap()));
    assert_eq!(first.load().unwrap().len(), 3);
    first
        .save(ShiftType::new("Relief", 9, 0, 240, "#AA00AA"))
        .unwrap();

    let second = ShiftTypeCatalog::new(Arc::new(JsonStore::open(&path).unwrap()));
    let names: Vec<String> = second.load().unwrap().iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, ["Afternoon", "Morning", "Night", "Relief"]);

    let relief = second.get_by_name("relief").unwrap();
    assert!(relief.is_user_defined);
    second.soft_delete(relief.id.unwrap()).unwrap();

    let store = JsonStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 4);
    assert_eq!(store.list_active().unwrap().len(), 3);
    assert_eq!(store.list_user_defined().unwrap().len(), 1);
}

#[test]
fn cycle_info_never_reads_the_store() {
    let store = Arc::new(SwitchableStore::default());
    let catalog = Arc::new(ShiftTypeCatalog::new(store.clone()));
    let engine = ScheduleEngine::new(Arc::clone(&catalog), None);
    assert_eq!(engine.cycle_info_at(anchor()).catalog_size, 0);
    engine.init().unwrap();

    catalog
        .save(ShiftType::new("Relief", 9, 0, 240, "#AA00AA"))
        .unwrap();
    let before = store.reads.load(Ordering::SeqCst);
    let info = engine.cycle_info_at(anchor());
    assert_eq!(store.reads.load(Ordering::SeqCst), before);
    assert_eq!(info.catalog_size, 3);
    assert_eq!(info.current_cycle_position, 0);

    engine.refresh_shift_types().unwrap();
    assert_eq!(engine.cycle_info_at(anchor()).catalog_size, 4);
}
