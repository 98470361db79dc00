/// Data models for stored IR codes
///
/// Records are persisted as JSON; field names here are the on-disk names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored IR code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrCode {
    pub id: String,
    pub name: String,
    pub device: String,
    pub command: String,
    pub wire_code: String,
    pub interchange_code: String, // derived from wire_code
    pub frequency: u32,           // derived from interchange_code
    pub created_at: String,       // RFC 3339
    #[serde(default)]
    pub notes: String,
}

impl IrCode {
    /// Case-insensitive substring match over the free-text fields
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.device, &self.command, &self.notes]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Input for storing a new code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeInput {
    pub name: String,
    pub device: String,
    pub command: String,
    pub wire_code: String,
    #[serde(default)]
    pub notes: String,
}

impl CodeInput {
    pub fn new(
        name: impl Into<String>,
        device: impl Into<String>,
        command: impl Into<String>,
        wire_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            command: command.into(),
            wire_code: wire_code.into(),
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Fields an update may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateField {
    Name,
    Device,
    Command,
    WireCode,
    Notes,
}

impl UpdateField {
    pub const ALL: [UpdateField; 5] = [
        UpdateField::Name,
        UpdateField::Device,
        UpdateField::Command,
        UpdateField::WireCode,
        UpdateField::Notes,
    ];

    /// Look up a field by its record attribute name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateField::Name => "name",
            UpdateField::Device => "device",
            UpdateField::Command => "command",
            UpdateField::WireCode => "wire_code",
            UpdateField::Notes => "notes",
        }
    }
}

impl std::fmt::Display for UpdateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of changes to apply to one record
///
/// `id`, `created_at` and the derived fields are never settable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeUpdate {
    pub name: Option<String>,
    pub device: Option<String>,
    pub command: Option<String>,
    pub wire_code: Option<String>,
    pub notes: Option<String>,
}

impl CodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: UpdateField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            UpdateField::Name => self.name = value,
            UpdateField::Device => self.device = value,
            UpdateField::Command => self.command = value,
            UpdateField::WireCode => self.wire_code = value,
            UpdateField::Notes => self.notes = value,
        }
        self
    }

    /// Build an update from `(attribute, value)` pairs
    ///
    /// Names outside the allow-list are skipped and returned so the caller
    /// can report them.
    pub fn from_pairs<I, K, V>(pairs: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut update = Self::new();
        let mut ignored = Vec::new();

        for (key, value) in pairs {
            match UpdateField::parse(key.as_ref()) {
                Some(field) => update = update.set(field, value),
                None => ignored.push(key.as_ref().to_string()),
            }
        }

        (update, ignored)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy the set fields onto `code` (derived fields are left alone)
    pub(crate) fn apply_to(&self, code: &mut IrCode) {
        if let Some(name) = &self.name {
            code.name = name.clone();
        }
        if let Some(device) = &self.device {
            code.device = device.clone();
        }
        if let Some(command) = &self.command {
            code.command = command.clone();
        }
        if let Some(wire_code) = &self.wire_code {
            code.wire_code = wire_code.clone();
        }
        if let Some(notes) = &self.notes {
            code.notes = notes.clone();
        }
    }
}

/// Aggregate view of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_codes: usize,
    pub total_devices: usize,
    pub devices: Vec<String>,
    pub codes_by_device: BTreeMap<String, usize>,
}

/// Self-describing export file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub export_date: String,
    pub total_codes: usize,
    pub codes: BTreeMap<String, IrCode>,
}
