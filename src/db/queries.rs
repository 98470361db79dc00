/// Record operations for the IR code store
///
/// Every mutation runs id generation, the map change and the file write
/// under one lock so concurrent callers cannot interleave.

use crate::db::models::*;
use crate::db::store::{write_atomic, CodeMap, IrRecordStore};
use crate::error::{IrError, Result};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::path::Path;

impl IrRecordStore {
    /// Convert and store a new code
    ///
    /// # Arguments
    /// * `input` - Names and wire code for the new record
    ///
    /// # Returns
    /// * `Ok(String)` - The generated id
    /// * `Err(IrError::Validation)` - If the wire code does not convert
    /// * `Err(IrError::Io)` - If the record was added but could not be saved
    pub async fn add(&self, input: CodeInput) -> Result<String> {
        let converted = self
            .codec()
            .convert(&input.wire_code)
            .map_err(|e| IrError::Validation(e.to_string()))?;

        let mut codes = self.lock().await;
        let id = self.generate_id(&codes, &input.device, &input.command);

        let code = IrCode {
            id: id.clone(),
            name: input.name,
            device: input.device,
            command: input.command,
            wire_code: converted.wire_code,
            interchange_code: converted.interchange_code,
            frequency: converted.frequency,
            created_at: Utc::now().to_rfc3339(),
            notes: input.notes,
        };

        codes.insert(id.clone(), code);
        self.write_codes(&codes).await?;

        info!("Saved IR code {}", id);
        Ok(id)
    }

    /// Get a code by id
    pub async fn get(&self, id: &str) -> Option<IrCode> {
        self.lock().await.get(id).cloned()
    }

    /// Get every code recorded for a device (exact name match)
    pub async fn get_by_device(&self, device: &str) -> Vec<IrCode> {
        self.lock()
            .await
            .values()
            .filter(|code| code.device == device)
            .cloned()
            .collect()
    }

    /// Get all codes
    pub async fn get_all(&self) -> Vec<IrCode> {
        self.lock().await.values().cloned().collect()
    }

    /// Distinct device names, sorted
    pub async fn get_devices(&self) -> Vec<String> {
        let codes = self.lock().await;
        device_names(&codes)
    }

    /// Delete a code
    ///
    /// Returns whether it existed. Nothing is written when it did not.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut codes = self.lock().await;

        if codes.remove(id).is_none() {
            return Ok(false);
        }

        self.write_codes(&codes).await?;
        info!("Deleted IR code {}", id);
        Ok(true)
    }

    /// Apply `update` to an existing code
    ///
    /// A new wire code is converted first; if that fails nothing changes
    /// and `Ok(false)` is returned, as it is for an unknown id.
    pub async fn update(&self, id: &str, update: CodeUpdate) -> Result<bool> {
        let mut codes = self.lock().await;

        let Some(current) = codes.get(id) else {
            return Ok(false);
        };

        if update.is_empty() {
            debug!("Empty update for IR code {}", id);
            return Ok(true);
        }

        let mut code = current.clone();
        update.apply_to(&mut code);

        if let Some(wire_code) = &update.wire_code {
            match self.codec().convert(wire_code) {
                Ok(converted) => {
                    code.interchange_code = converted.interchange_code;
                    code.frequency = converted.frequency;
                }
                Err(e) => {
                    warn!("Rejected update of IR code {}: {}", id, e);
                    return Ok(false);
                }
            }
        }

        codes.insert(id.to_string(), code);
        self.write_codes(&codes).await?;
        Ok(true)
    }

    /// Apply `(attribute, value)` pairs as an update
    ///
    /// Attributes that are not updatable are logged and skipped.
    pub async fn update_fields<I, K, V>(&self, id: &str, fields: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let (update, ignored) = CodeUpdate::from_pairs(fields);
        for field in ignored {
            debug!("Ignoring non-updatable field '{}' for IR code {}", field, id);
        }

        self.update(id, update).await
    }

    /// Case-insensitive search over name, device, command and notes
    pub async fn search(&self, query: &str) -> Vec<IrCode> {
        let needle = query.to_lowercase();

        self.lock()
            .await
            .values()
            .filter(|code| code.matches(&needle))
            .cloned()
            .collect()
    }

    /// Totals and per-device counts
    pub async fn statistics(&self) -> StoreStatistics {
        let codes = self.lock().await;
        let devices = device_names(&codes);

        let codes_by_device = devices
            .iter()
            .map(|device| {
                let count = codes.values().filter(|code| &code.device == device).count();
                (device.clone(), count)
            })
            .collect();

        StoreStatistics {
            total_codes: codes.len(),
            total_devices: devices.len(),
            devices,
            codes_by_device,
        }
    }

    /// Write a snapshot of every code to `path`
    ///
    /// Returns false (and logs) on failure.
    pub async fn export_to<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();

        let snapshot = {
            let codes = self.lock().await;
            ExportSnapshot {
                export_date: Utc::now().to_rfc3339(),
                total_codes: codes.len(),
                codes: codes.clone(),
            }
        };

        let result = match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => write_atomic(path, &bytes).await.map_err(IrError::from),
            Err(e) => Err(IrError::from(e)),
        };

        match result {
            Ok(()) => {
                info!("Exported {} IR codes to {}", snapshot.total_codes, path.display());
                true
            }
            Err(e) => {
                error!("Export to {} failed: {}", path.display(), e);
                false
            }
        }
    }

    /// Merge codes from an export file, overwriting matching ids
    ///
    /// The whole file is checked before anything is merged. Returns false
    /// (and logs) on failure, leaving the store as it was.
    pub async fn import_from<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();

        let incoming = match self.read_import(path).await {
            Ok(incoming) => incoming,
            Err(e) => {
                error!("Import from {} failed: {}", path.display(), e);
                return false;
            }
        };

        let mut codes = self.lock().await;
        let mut merged = codes.clone();
        let count = incoming.len();
        merged.extend(incoming);

        if let Err(e) = self.write_codes(&merged).await {
            error!("Import from {} failed: {}", path.display(), e);
            return false;
        }

        *codes = merged;
        info!("Imported {} IR codes from {}", count, path.display());
        true
    }

    async fn read_import(&self, path: &Path) -> Result<CodeMap> {
        let text = tokio::fs::read_to_string(path).await?;
        let mut value: serde_json::Value = serde_json::from_str(&text)?;

        let codes = value
            .get_mut("codes")
            .map(serde_json::Value::take)
            .ok_or_else(|| IrError::Format("no 'codes' entry in import file".to_string()))?;
        let mut incoming: CodeMap = serde_json::from_value(codes)?;

        for (key, code) in incoming.iter_mut() {
            if *key != code.id {
                return Err(IrError::Format(format!(
                    "entry '{}' holds record '{}'",
                    key, code.id
                )));
            }

            let converted = self
                .codec()
                .convert(&code.wire_code)
                .map_err(|e| IrError::Validation(format!("{}: {}", key, e)))?;

            if converted.interchange_code != code.interchange_code
                || converted.frequency != code.frequency
            {
                warn!("Re-deriving interchange code for imported record {}", key);
                code.interchange_code = converted.interchange_code;
                code.frequency = converted.frequency;
            }
        }

        Ok(incoming)
    }
}

fn device_names(codes: &CodeMap) -> Vec<String> {
    codes
        .values()
        .map(|code| code.device.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
