//! A one-file-per-object JSON store layered on atomfile, the way a
//! collaborator would use it

use anyhow::{Context, Result};
use atomfile::config::{ConfigOverrides, resolve_config};
use atomfile::{AtomicFile, AtomicFileConfig, Strategy, sweep_temp_files};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct ObjectStore {
    root: PathBuf,
    files: AtomicFile,
}

impl ObjectStore {
    fn new(root: &Path, config: &AtomicFileConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            files: AtomicFile::from_config(config),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn save(&self, id: &str, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.files
            .write(self.path_for(id), bytes)
            .with_context(|| format!("saving object {id}"))
    }

    fn load(&self, id: &str) -> Result<Option<Value>> {
        match self.files.read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("loading object {id}")),
        }
    }
}

fn config_for(strategy: Strategy) -> AtomicFileConfig {
    AtomicFileConfig {
        strategy,
        ..Default::default()
    }
}

#[test]
fn test_objects_round_trip_with_both_strategies() -> Result<()> {
    for strategy in [Strategy::Rename, Strategy::Lock] {
        let temp_dir = TempDir::new()?;
        let store = ObjectStore::new(temp_dir.path(), &config_for(strategy));

        let npc = json!({"id": "npc-42", "hp": 10, "inventory": ["sword", "apple"]});
        store.save("npc-42", &npc)?;
        assert_eq!(store.load("npc-42")?, Some(npc));

        let updated = json!({"id": "npc-42", "hp": 3, "inventory": []});
        store.save("npc-42", &updated)?;
        assert_eq!(store.load("npc-42")?, Some(updated));
    }
    Ok(())
}

#[test]
fn test_missing_object_loads_as_none() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ObjectStore::new(temp_dir.path(), &AtomicFileConfig::default());

    assert_eq!(store.load("nobody")?, None);
    Ok(())
}

#[test]
fn test_strategy_from_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("atomfile.toml");
    fs::write(
        &config_path,
        "strategy = \"lock\"\nsync_writes = false\n\n[retry]\nattempts = 3\ndelay_ms = 2\n",
    )?;

    let config = resolve_config(
        &ConfigOverrides {
            config_path: Some(config_path),
            ..Default::default()
        },
        None,
    )?;
    let store = ObjectStore::new(temp_dir.path(), &config);
    assert_eq!(store.files.strategy(), Strategy::Lock);
    assert_eq!(store.files.retry_policy().attempts(), 3);
    assert_eq!(store.files.retry_policy().delay(), Duration::from_millis(2));

    store.save("chest-1", &json!({"gold": 100}))?;
    assert_eq!(store.load("chest-1")?, Some(json!({"gold": 100})));
    Ok(())
}

#[test]
fn test_sweep_clears_crashed_writer_leftovers() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = ObjectStore::new(temp_dir.path(), &AtomicFileConfig::default());
    store.save("npc-7", &json!({"hp": 1}))?;

    let target = store.path_for("npc-7");
    fs::write(temp_dir.path().join("npc-7.json.otherhost-99-0.tmp"), b"{\"hp\":")?;

    assert_eq!(sweep_temp_files(&target, Duration::ZERO)?, 1);
    assert_eq!(store.load("npc-7")?, Some(json!({"hp": 1})));
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 1);
    Ok(())
}
