use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Platform key-value storage: string values under string keys, read and
/// written whole.
///
/// The returned futures are `Send` so that a drain can be spawned onto the
/// runtime as a detached task.
pub trait KeyValueStore: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, anyhow::Error>> + Send;

    fn set(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), anyhow::Error>> + Send;
}

/// One file per key, `<dir>/<key>.json`.
///
/// Writes go to a temp file which is flushed to disk and then renamed over the
/// target, so a reader never sees a half-written value and a `set` that returned
/// `Ok` survives a crash.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// The directory is created lazily, on first `set`
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    fn path_for(
        &self,
        key: &str,
    ) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn tmp_path_for(
        &self,
        key: &str,
    ) -> PathBuf {
        self.dir.join(format!("{key}.json.tmp"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>, anyhow::Error> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            // nothing written yet
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("could not read {}", path.display())),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: String,
    ) -> Result<(), anyhow::Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("could not create {}", self.dir.display()))?;

        let path = self.path_for(key);
        let tmp = self.tmp_path_for(key);
        let mut file = File::create(&tmp)
            .await
            .with_context(|| format!("could not create {}", tmp.display()))?;
        file.write_all(value.as_bytes())
            .await
            .with_context(|| format!("could not write {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("could not flush {}", tmp.display()))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("could not replace {}", path.display()))?;
        sync_dir(&self.dir).await
    }
}

/// Persist the rename itself
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), anyhow::Error> {
    File::open(dir)
        .await
        .with_context(|| format!("could not open {}", dir.display()))?
        .sync_all()
        .await
        .with_context(|| format!("could not flush {}", dir.display()))
}

// directories can't be opened as files outside unix
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), anyhow::Error> { Ok(()) }

/// Non-durable store, for tests and throwaway runs
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>, anyhow::Error> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: String,
    ) -> Result<(), anyhow::Error> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        values.insert(key.to_owned(), value);
        Ok(())
    }
}
