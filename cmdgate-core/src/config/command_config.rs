// File: cmdgate-core/src/config/command_config.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cmdgate_common::models::{CommandDescriptor, CommandSettings, GateSettings};
use cmdgate_common::traits::ConfigSource;
use cmdgate_common::Error;

/// On-disk shape of the command config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub settings: GateSettings,
    #[serde(default)]
    pub commands: BTreeMap<String, CommandSettings>,
}

/// JSON-backed [`ConfigSource`]. `reload` swaps
/// the whole document at once.
pub struct JsonCommandConfig {
    path: Option<PathBuf>,
    doc: RwLock<ConfigDocument>,
}

impl JsonCommandConfig {
    pub fn new(doc: ConfigDocument) -> Self {
        Self {
            path: None,
            doc: RwLock::new(doc),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        Ok(Self::new(doc))
    }

    /// Loads `path`, or starts from an empty document if the file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            read_document(&path)?
        } else {
            info!("Config file {} not found, starting with defaults", path.display());
            ConfigDocument::default()
        };
        Ok(Self {
            path: Some(path),
            doc: RwLock::new(doc),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-reads the file this config was loaded from. On error the current
    /// document stays in place.
    pub fn reload(&self) -> Result<GateSettings, Error> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::Config("config was not loaded from a file".into()))?;
        let doc = read_document(path)?;
        let settings = doc.settings.clone();
        *self.doc.write() = doc;
        info!("Reloaded command config from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(&*self.doc.read())?;
        fs::write(path.as_ref(), json + "\n")?;
        debug!("Wrote command config to {}", path.as_ref().display());
        Ok(())
    }

    /// Adds entries for axes each command is not exempt from. Existing values win.
    /// Returns true if anything was added.
    pub fn ensure_defaults(&self, descriptors: &[Arc<CommandDescriptor>]) -> bool {
        let mut doc = self.doc.write();
        let mut changed = false;
        for descriptor in descriptors {
            let entry = doc
                .commands
                .entry(descriptor.config_section.clone())
                .or_default();
            changed |= fill(&mut entry.enabled, true);
            if !descriptor.exempt_cooldown {
                changed |= fill(&mut entry.cooldown, 0);
            }
            if !descriptor.exempt_warmup {
                changed |= fill(&mut entry.warmup, 0);
            }
            if !descriptor.exempt_cost {
                changed |= fill(&mut entry.cost, 0.0);
            }
        }
        changed
    }

    pub fn gate_settings(&self) -> GateSettings {
        self.doc.read().settings.clone()
    }

    pub fn section(&self, section: &str) -> CommandSettings {
        self.doc
            .read()
            .commands
            .get(section)
            .cloned()
            .unwrap_or_default()
    }

    pub fn document(&self) -> ConfigDocument {
        self.doc.read().clone()
    }
}

fn fill<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

fn read_document(path: &Path) -> Result<ConfigDocument, Error> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

impl ConfigSource for JsonCommandConfig {
    fn is_enabled(&self, section: &str) -> bool {
        self.section(section).enabled()
    }

    fn cooldown_seconds(&self, section: &str) -> i64 {
        self.section(section).cooldown_seconds()
    }

    fn warmup_seconds(&self, section: &str) -> i64 {
        self.section(section).warmup_seconds()
    }

    fn cost(&self, section: &str) -> f64 {
        self.section(section).cost()
    }
}
