/// File-backed IR code store
///
/// Holds the id -> record mapping in memory behind an async mutex and mirrors
/// it to a single JSON file after every mutation.

use crate::codec::IrCodec;
use crate::db::models::IrCode;
use crate::error::{IrError, Result};
use log::{debug, error, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Characters that may not appear in a generated id
const ID_FILTER: &str = r"[^a-z0-9_]";

pub(crate) type CodeMap = BTreeMap<String, IrCode>;

/// Store handle; clones share the same records and file
#[derive(Clone)]
pub struct IrRecordStore {
    codes: Arc<Mutex<CodeMap>>,
    path: PathBuf,
    codec: IrCodec,
    id_filter: Regex,
}

impl IrRecordStore {
    /// Create an empty store bound to `path` without touching the disk
    pub fn new<P: AsRef<Path>>(path: P, codec: IrCodec) -> Result<Self> {
        let id_filter = Regex::new(ID_FILTER)
            .map_err(|e| IrError::Config(format!("bad id filter: {}", e)))?;

        Ok(Self {
            codes: Arc::new(Mutex::new(CodeMap::new())),
            path: path.as_ref().to_path_buf(),
            codec,
            id_filter,
        })
    }

    /// Open the store at `path`, loading whatever is already there
    ///
    /// # Arguments
    /// * `path` - JSON file holding the records (created on first write)
    /// * `codec` - Codec used to derive interchange text on add/update
    ///
    /// # Returns
    /// * `Ok(IrRecordStore)` - Store ready for use
    /// * `Err(IrError)` - If the parent directory cannot be created
    ///
    /// # Examples
    /// ```no_run
    /// use ir_manager_lib::{IrCodec, IrRecordStore};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = IrRecordStore::open("ir_codes.json", IrCodec::new()).await?;
    /// println!("{} codes", store.get_all().await.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open<P: AsRef<Path>>(path: P, codec: IrCodec) -> Result<Self> {
        let store = Self::new(path, codec)?;

        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        store.load().await;
        Ok(store)
    }

    /// Replace the in-memory records with the file contents
    ///
    /// A missing file means an empty store. An unreadable or corrupt file is
    /// discarded with a warning and the store starts empty. Returns the
    /// number of records loaded.
    pub async fn load(&self) -> usize {
        let mut codes = self.codes.lock().await;

        *codes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<CodeMap>(&bytes) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(
                        "Discarding corrupt code store {}: {}",
                        self.path.display(),
                        e
                    );
                    CodeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No code store at {}, starting empty", self.path.display());
                CodeMap::new()
            }
            Err(e) => {
                warn!(
                    "Could not read code store {}, starting empty: {}",
                    self.path.display(),
                    e
                );
                CodeMap::new()
            }
        };

        codes.len()
    }

    /// Write every record to the backing file
    pub async fn persist(&self) -> Result<()> {
        let codes = self.codes.lock().await;
        self.write_codes(&codes).await
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Codec used for derivation
    pub fn codec(&self) -> IrCodec {
        self.codec
    }

    /// Take the store lock; mutations hold it across their file write
    pub(crate) async fn lock(&self) -> MutexGuard<'_, CodeMap> {
        self.codes.lock().await
    }

    pub(crate) async fn write_codes(&self, codes: &CodeMap) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(codes)?;

        write_atomic(&self.path, &bytes).await.map_err(|e| {
            error!("Failed to save code store {}: {}", self.path.display(), e);
            IrError::Io(e)
        })
    }

    /// Lowercased `device_command` with spaces as underscores and anything
    /// outside `[a-z0-9_]` removed; `_1`, `_2`, ... appended until unused.
    pub(crate) fn generate_id(&self, codes: &CodeMap, device: &str, command: &str) -> String {
        let joined = format!("{}_{}", device, command).to_lowercase().replace(' ', "_");
        let base_id = self.id_filter.replace_all(&joined, "").into_owned();

        if !codes.contains_key(&base_id) {
            return base_id;
        }

        (1..)
            .map(|counter| format!("{}_{}", base_id, counter))
            .find(|candidate| !codes.contains_key(candidate))
            .unwrap_or(base_id)
    }
}

/// Write `bytes` next to `path` and rename over it
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("ir_codes"));
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    Ok(())
}
