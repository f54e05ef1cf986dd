use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{DomainError, Stack, validate_content},
    id::new_stack_id,
};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct StoreInit {
    pub data_dir: PathBuf,
}

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    SerdeJson(serde_json::Error),
    Domain(DomainError),
    SchemaVersionMismatch { expected: u32, got: u32 },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::SerdeJson(e) => write!(f, "json error: {e}"),
            Self::Domain(e) => write!(f, "{e}"),
            Self::SchemaVersionMismatch { expected, got } => {
                write!(f, "schema_version mismatch: expected {expected}, got {got}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::SerdeJson(e) => Some(e),
            Self::Domain(e) => Some(e),
            Self::SchemaVersionMismatch { .. } => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::SerdeJson(value)
    }
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    pub schema_version: u32,
    #[serde(default)]
    pub stacks: BTreeMap<Uuid, Stack>,
}

impl PersistedState {
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            stacks: BTreeMap::new(),
        }
    }
}

/// Stacks persisted as a single pretty-printed `state.json` snapshot.
///
/// Every mutation rewrites the snapshot before returning.
pub struct JsonSnapshotStore {
    state_path: PathBuf,
    state: PersistedState,
}

impl JsonSnapshotStore {
    pub fn load_or_init(init: StoreInit) -> Result<Self, StoreError> {
        fs::create_dir_all(&init.data_dir)?;

        let state_path = init.data_dir.join("state.json");
        let (state, is_new_state) = if state_path.exists() {
            let bytes = fs::read(&state_path)?;
            let state: PersistedState = serde_json::from_slice(&bytes)?;
            if state.schema_version != SCHEMA_VERSION {
                return Err(StoreError::SchemaVersionMismatch {
                    expected: SCHEMA_VERSION,
                    got: state.schema_version,
                });
            }
            (state, false)
        } else {
            (PersistedState::empty(), true)
        };

        let store = Self { state_path, state };

        if is_new_state {
            store.save()?;
        }

        Ok(store)
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&self.state)?;
        write_atomic(&self.state_path, &bytes)?;
        Ok(())
    }

    pub fn create_stack(&mut self, content: Vec<f64>) -> Result<Stack, StoreError> {
        validate_content(&content)?;

        let stack = Stack {
            id: new_stack_id(),
            content,
            created_at: Utc::now(),
        };
        self.state.stacks.insert(stack.id, stack.clone());
        self.save()?;
        Ok(stack)
    }

    /// Stacks in creation order.
    pub fn list_stacks(&self, offset: usize, limit: usize) -> Vec<Stack> {
        self.state
            .stacks
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_stack(&self, stack_id: &Uuid) -> Option<Stack> {
        self.state.stacks.get(stack_id).cloned()
    }

    pub fn delete_stack(&mut self, stack_id: &Uuid) -> Result<bool, StoreError> {
        let deleted = self.state.stacks.remove(stack_id).is_some();
        if deleted {
            self.save()?;
        }
        Ok(deleted)
    }

    pub fn push_value(&mut self, stack_id: &Uuid, value: f64) -> Result<Option<Stack>, StoreError> {
        validate_content(&[value])?;

        let stack = match self.state.stacks.get_mut(stack_id) {
            Some(stack) => stack,
            None => return Ok(None),
        };
        stack.content.push(value);
        let stack = stack.clone();
        self.save()?;
        Ok(Some(stack))
    }

    pub fn replace_content(
        &mut self,
        stack_id: &Uuid,
        content: Vec<f64>,
    ) -> Result<Option<Stack>, StoreError> {
        validate_content(&content)?;

        let stack = match self.state.stacks.get_mut(stack_id) {
            Some(stack) => stack,
            None => return Ok(None),
        };
        stack.content = content;
        let stack = stack.clone();
        self.save()?;
        Ok(Some(stack))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = dir.join(format!("{}.tmp", file_name.to_string_lossy()));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    #[cfg(windows)]
    {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn test_init(tmp_dir: &Path) -> StoreInit {
        StoreInit {
            data_dir: tmp_dir.to_path_buf(),
        }
    }

    #[test]
    fn init_creates_empty_state_json() {
        let tmp = tempfile::tempdir().unwrap();

        let _store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();
        let state_path = tmp.path().join("state.json");
        assert!(state_path.exists());

        let bytes = fs::read(&state_path).unwrap();
        let state: PersistedState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(state, PersistedState::empty());
    }

    #[test]
    fn save_load_roundtrip_persists_stacks() {
        let tmp = tempfile::tempdir().unwrap();

        let mut store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();
        let stack = store.create_stack(vec![1.0, 2.5]).unwrap();
        drop(store);

        let store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();
        assert_eq!(store.get_stack(&stack.id), Some(stack));
    }

    #[test]
    fn schema_version_mismatch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("state.json"),
            br#"{"schema_version": 99, "stacks": {}}"#,
        )
        .unwrap();

        let err = JsonSnapshotStore::load_or_init(test_init(tmp.path()))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StoreError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                got: 99
            }
        ));
    }

    #[test]
    fn list_is_in_creation_order_and_paginated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();

        let ids: Vec<Uuid> = (0..5)
            .map(|i| store.create_stack(vec![f64::from(i)]).unwrap().id)
            .collect();

        let all: Vec<Uuid> = store.list_stacks(0, 100).into_iter().map(|s| s.id).collect();
        assert_eq!(all, ids);

        let page: Vec<Uuid> = store.list_stacks(2, 2).into_iter().map(|s| s.id).collect();
        assert_eq!(page, ids[2..4].to_vec());

        assert!(store.list_stacks(10, 2).is_empty());
    }

    #[test]
    fn push_and_replace_update_content() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();
        let stack = store.create_stack(vec![]).unwrap();

        let pushed = store.push_value(&stack.id, 3.0).unwrap().unwrap();
        assert_eq!(pushed.content, vec![3.0]);
        assert_eq!(pushed.created_at, stack.created_at);

        let replaced = store
            .replace_content(&stack.id, vec![4.0, 5.0])
            .unwrap()
            .unwrap();
        assert_eq!(replaced.content, vec![4.0, 5.0]);

        assert!(store.push_value(&Uuid::nil(), 1.0).unwrap().is_none());
        assert!(store.replace_content(&Uuid::nil(), vec![]).unwrap().is_none());
    }

    #[test]
    fn push_rejects_non_finite_value() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();
        let stack = store.create_stack(vec![1.0]).unwrap();

        let err = store.push_value(&stack.id, f64::INFINITY).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::NonFiniteValue)));
        assert_eq!(store.get_stack(&stack.id).unwrap().content, vec![1.0]);
    }

    #[test]
    fn delete_reports_whether_stack_existed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = JsonSnapshotStore::load_or_init(test_init(tmp.path())).unwrap();
        let stack = store.create_stack(vec![1.0, 2.0]).unwrap();

        assert!(store.delete_stack(&stack.id).unwrap());
        assert!(!store.delete_stack(&stack.id).unwrap());
        assert!(store.get_stack(&stack.id).is_none());
    }
}
