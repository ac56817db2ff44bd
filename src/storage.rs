use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fs, path::PathBuf};

/// Durable key/value storage of JSON blobs, one file per key.
#[derive(Clone, Debug)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonStore { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read the raw record stored under `key`, `None` if there is none
    pub fn read(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);

        if !path
            .try_exists()
            .with_context(|| format!("failed to check if {path:?} exists"))?
        {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&path).with_context(|| format!("failed to read {path:?}"))?;
        let value =
            serde_json::from_str(&content).with_context(|| format!("failed to parse {path:?}"))?;

        Ok(Some(value))
    }

    /// Write `value` under `key`, replacing the previous record atomically
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create store directory {:?}", self.dir))?;

        let path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{key}.json.tmp"));
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize record {key}"))?;

        fs::write(&tmp_path, content).with_context(|| format!("failed to write {tmp_path:?}"))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to move {tmp_path:?} to {path:?}"))?;

        debug!("persisted {path:?}");
        Ok(())
    }

    /// Load the record under `key` merged over `T::default()`
    ///
    /// Keys missing from the stored record keep their default, unknown keys are
    /// ignored. A missing record yields the defaults.
    pub fn load_merged<T>(&self, key: &str) -> Result<T>
    where
        T: Default + Serialize + DeserializeOwned,
    {
        match self.read(key)? {
            Some(stored) => merge_over_default(stored),
            None => Ok(T::default()),
        }
    }
}

/// Overlay the top-level fields of `stored` onto the serialized defaults of `T`
///
/// Fields are taken one at a time: a stored field that does not decode as the
/// type of its default is dropped with a warning, the other fields are kept.
pub fn merge_over_default<T>(stored: Value) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(T::default()).context("failed to serialize defaults")?;

    let (Value::Object(merged_fields), Value::Object(stored_fields)) = (&mut merged, stored) else {
        bail!("failed to merge record: expected a JSON object");
    };

    for (key, value) in stored_fields {
        let Some(default) = merged_fields.insert(key.clone(), value) else {
            merged_fields.remove(&key);
            continue;
        };

        if let Err(e) = serde_json::from_value::<T>(Value::Object(merged_fields.clone())) {
            warn!("ignoring stored field {key}: {e}");
            merged_fields.insert(key, default);
        }
    }

    serde_json::from_value(merged).context("failed to decode merged record")
}
