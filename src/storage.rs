use crate::model::{ShiftType, ShiftTypeId};
use anyhow::{bail, Context};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tempfile::NamedTempFile;

/// Stockage persistant des types de poste.
///
/// Les noms sont uniques sans tenir compte de la casse ; la suppression est
/// logique (`is_active = false`).
pub trait ShiftTypeStore: Send + Sync {
    /// Toutes les lignes, actives ou non.
    fn list_all(&self) -> anyhow::Result<Vec<ShiftType>>;

    fn list_active(&self) -> anyhow::Result<Vec<ShiftType>> {
        Ok(self.list_all()?.into_iter().filter(|t| t.is_active).collect())
    }

    fn list_user_defined(&self) -> anyhow::Result<Vec<ShiftType>> {
        Ok(self.list_all()?.into_iter().filter(|t| t.is_user_defined).collect())
    }

    fn find(&self, id: ShiftTypeId) -> anyhow::Result<Option<ShiftType>> {
        Ok(self.list_all()?.into_iter().find(|t| t.id == Some(id)))
    }

    fn find_by_name(&self, name: &str) -> anyhow::Result<Option<ShiftType>> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|t| t.has_name(name)))
    }

    fn count(&self) -> anyhow::Result<usize> {
        Ok(self.list_all()?.len())
    }

    /// Insère une ligne sans identifiant et renvoie la ligne avec son id.
    fn insert(&self, shift_type: ShiftType) -> anyhow::Result<ShiftType>;

    /// Insère un lot de lignes. Les stockages fournis l'écrivent d'un bloc :
    /// en cas d'erreur, aucune ligne du lot n'est conservée.
    fn insert_many(&self, rows: Vec<ShiftType>) -> anyhow::Result<Vec<ShiftType>> {
        rows.into_iter().map(|row| self.insert(row)).collect()
    }

    /// Remplace la ligne portant le même identifiant.
    fn update(&self, shift_type: &ShiftType) -> anyhow::Result<()>;

    /// Désactive la ligne ; `false` si l'identifiant est inconnu.
    fn deactivate(&self, id: ShiftTypeId) -> anyhow::Result<bool> {
        let Some(mut row) = self.find(id)? else {
            return Ok(false);
        };
        row.is_active = false;
        row.touch();
        self.update(&row)?;
        Ok(true)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Table {
    next_id: u64,
    rows: BTreeMap<u64, ShiftType>,
}

impl Table {
    fn insert(&mut self, mut shift_type: ShiftType) -> anyhow::Result<ShiftType> {
        if shift_type.id.is_some() {
            bail!("insert expects a row without id");
        }
        self.check_unique_name(&shift_type)?;
        self.next_id += 1;
        let id = self.next_id;
        shift_type.id = Some(ShiftTypeId::new(id));
        self.rows.insert(id, shift_type.clone());
        Ok(shift_type)
    }

    fn insert_many(&mut self, rows: Vec<ShiftType>) -> anyhow::Result<Vec<ShiftType>> {
        let mut next = self.clone();
        let inserted = rows
            .into_iter()
            .map(|row| next.insert(row))
            .collect::<anyhow::Result<Vec<_>>>()?;
        *self = next;
        Ok(inserted)
    }

    fn update(&mut self, shift_type: &ShiftType) -> anyhow::Result<()> {
        let id = shift_type.id.context("update expects a row with id")?.get();
        if !self.rows.contains_key(&id) {
            bail!("no shift type with id {id}");
        }
        self.check_unique_name(shift_type)?;
        self.rows.insert(id, shift_type.clone());
        Ok(())
    }

    fn check_unique_name(&self, candidate: &ShiftType) -> anyhow::Result<()> {
        let clash = self
            .rows
            .values()
            .any(|t| t.id != candidate.id && t.has_name(&candidate.name));
        if clash {
            bail!("shift type name already used: {}", candidate.name);
        }
        Ok(())
    }
}

/// Stockage en mémoire.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("store lock poisoned")
}

impl ShiftTypeStore for MemoryStore {
    fn list_all(&self) -> anyhow::Result<Vec<ShiftType>> {
        Ok(self.table.read().map_err(poisoned)?.rows.values().cloned().collect())
    }

    fn insert(&self, shift_type: ShiftType) -> anyhow::Result<ShiftType> {
        self.table.write().map_err(poisoned)?.insert(shift_type)
    }

    fn insert_many(&self, rows: Vec<ShiftType>) -> anyhow::Result<Vec<ShiftType>> {
        self.table.write().map_err(poisoned)?.insert_many(rows)
    }

    fn update(&self, shift_type: &ShiftType) -> anyhow::Result<()> {
        self.table.write().map_err(poisoned)?.update(shift_type)
    }
}

/// Stockage dans un fichier JSON, réécrit de manière atomique.
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<Table> {
        read_json_or_default(&self.path)
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Table) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut table = self.load()?;
        let out = f(&mut table)?;
        write_json_atomic(&self.path, &table)?;
        Ok(out)
    }
}

impl ShiftTypeStore for JsonStore {
    fn list_all(&self) -> anyhow::Result<Vec<ShiftType>> {
        Ok(self.load()?.rows.into_values().collect())
    }

    fn insert(&self, shift_type: ShiftType) -> anyhow::Result<ShiftType> {
        self.modify(|t| t.insert(shift_type))
    }

    fn insert_many(&self, rows: Vec<ShiftType>) -> anyhow::Result<Vec<ShiftType>> {
        self.modify(|t| t.insert_many(rows))
    }

    fn update(&self, shift_type: &ShiftType) -> anyhow::Result<()> {
        self.modify(|t| t.update(shift_type))
    }
}

/// Lit un fichier JSON ; un fichier absent donne la valeur par défaut.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Écriture atomique : fichier temporaire voisin puis renommage.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).with_context(|| "atomic rename")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_assigns_ids_and_enforces_names() {
        let store = MemoryStore::new();
        let a = store.insert(ShiftType::new("Early", 6, 0, 480, "#112233")).unwrap();
        let b = store.insert(ShiftType::new("Late", 14, 0, 480, "#112233")).unwrap();
        assert_eq!(a.id, Some(ShiftTypeId::new(1)));
        assert_eq!(b.id, Some(ShiftTypeId::new(2)));
        assert!(store.insert(ShiftType::new("EARLY", 6, 0, 60, "#112233")).is_err());
        assert_eq!(store.find_by_name("late").unwrap().unwrap().id, b.id);
    }

    #[test]
    fn deactivate_keeps_row() {
        let store = MemoryStore::new();
        let a = store.insert(ShiftType::new("Early", 6, 0, 480, "#112233")).unwrap();
        assert!(store.deactivate(a.id.unwrap()).unwrap());
        assert!(!store.deactivate(ShiftTypeId::new(99)).unwrap());
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn json_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.json");
        {
            let store = JsonStore::open(&path).unwrap();
            assert_eq!(store.count().unwrap(), 0);
            store.insert(ShiftType::new("Early", 6, 0, 480, "#112233")).unwrap();
        }
        let store = JsonStore::open(&path).unwrap();
        let rows = store.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Early");
        let next = store.insert(ShiftType::new("Late", 14, 0, 480, "#112233")).unwrap();
        assert_eq!(next.id, Some(ShiftTypeId::new(2)));
    }

    #[test]
    fn names_compare_case_insensitively_beyond_ascii() {
        let store = MemoryStore::new();
        store.insert(ShiftType::new("Équipe", 6, 0, 480, "#112233")).unwrap();
        assert!(store.insert(ShiftType::new("équipe", 7, 0, 480, "#112233")).is_err());
        assert!(store.find_by_name("ÉQUIPE").unwrap().is_some());
    }

    #[test]
    fn insert_many_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("types.json")).unwrap();
        store.insert(ShiftType::new("Late", 14, 0, 480, "#112233")).unwrap();
        let batch = vec![
            ShiftType::new("Early", 6, 0, 480, "#112233"),
            ShiftType::new("late", 15, 0, 480, "#112233"),
        ];
        assert!(store.insert_many(batch).is_err());
        assert_eq!(store.count().unwrap(), 1);

        let memory = MemoryStore::new();
        let rows = memory.insert_many(ShiftType::defaults()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].id, Some(ShiftTypeId::new(3)));
    }
}
