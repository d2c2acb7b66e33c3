//! In-process storage owner.
//!
//! [`MemoryStore`] holds settings, rules and the flagged log, optionally
//! persisted to a JSON file. It implements [`StorageBridge`] so a processor can
//! talk to it directly, queues [`Notification`]s for every change, and answers
//! [`Request`] messages.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analytics::LocalAnalytics;
use crate::bridge::{FlaggedEvent, Notification, StorageBridge};
use crate::config::{Configuration, Settings};
use crate::error::{Error, Result};
use crate::message::{Request, Response};
use crate::rule::{default_rules, Rule};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    #[serde(default)]
    settings: Settings,
    #[serde(default = "default_rules")]
    rules: Vec<Rule>,
    #[serde(default)]
    flagged_log: Vec<FlaggedEvent>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self::from(Configuration::default())
    }
}

impl From<Configuration> for StoreData {
    fn from(config: Configuration) -> Self {
        Self {
            settings: config.settings,
            rules: config.rules,
            flagged_log: Vec::new(),
        }
    }
}

/// Settings, rules and flagged log behind a lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    path: Option<PathBuf>,
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryStore {
    /// Create an unpersisted store holding the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configuration(config: Configuration) -> Self {
        Self {
            data: Mutex::new(StoreData::from(config)),
            ..Self::default()
        }
    }

    /// Open a store backed by `path`. A missing file starts from defaults;
    /// every change is written back.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let data: StoreData = serde_json::from_str(&content)?;
            log::info!(
                "Loaded store from {:?}: {} rule(s), {} flagged event(s)",
                path,
                data.rules.len(),
                data.flagged_log.len()
            );
            data
        } else {
            log::info!("No store at {:?}, starting from defaults", path);
            StoreData::default()
        };

        Ok(Self {
            data: Mutex::new(data),
            path: Some(path),
            notifications: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn configuration(&self) -> Configuration {
        let data = self.data.lock();
        Configuration::new(data.settings.clone(), data.rules.clone())
    }

    pub fn flagged_log(&self) -> Vec<FlaggedEvent> {
        self.data.lock().flagged_log.clone()
    }

    pub fn analytics(&self) -> LocalAnalytics {
        LocalAnalytics::from_events(&self.data.lock().flagged_log)
    }

    pub fn clear_log(&self) -> Result<()> {
        let mut data = self.data.lock();
        let mut next = data.clone();
        next.flagged_log.clear();
        self.commit(&mut data, next)
    }

    /// Drain change notifications queued since the last call.
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }

    /// Persist `next`, then make it the current state. On failure the
    /// current state is left as it was.
    fn commit(&self, data: &mut StoreData, next: StoreData) -> Result<()> {
        self.persist(&next)?;
        *data = next;
        Ok(())
    }

    /// Write the store file through a temp file in the same directory.
    fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(data)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Answer one message.
    pub fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Ping => return Response::Pong,
            Request::GetConfiguration => self.get_configuration().map(Response::Configuration),
            Request::SaveRules(rules) => self.save_rules(&rules).map(|()| Response::Ok),
            Request::SaveSettings(settings) => {
                self.save_settings(&settings).map(|()| Response::Ok)
            }
            Request::LogFlaggedEvent(event) => {
                self.log_flagged_event(&event).map(|()| Response::Ok)
            }
            Request::GetLocalAnalytics => Ok(Response::Analytics(self.analytics())),
            Request::ClearLocalLog => self.clear_log().map(|()| Response::Ok),
        };

        result.unwrap_or_else(|e| {
            log::warn!("Store request failed: {}", e);
            Response::Error(e.to_string())
        })
    }
}

impl StorageBridge for MemoryStore {
    fn get_configuration(&self) -> Result<Configuration> {
        Ok(self.configuration())
    }

    fn save_rules(&self, rules: &[Rule]) -> Result<()> {
        {
            let mut data = self.data.lock();
            let next = StoreData {
                rules: rules.to_vec(),
                ..data.clone()
            };
            self.commit(&mut data, next)?;
        }
        self.notify(Notification::RulesChanged);
        Ok(())
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        {
            let mut data = self.data.lock();
            let next = StoreData {
                settings: settings.clone(),
                ..data.clone()
            };
            self.commit(&mut data, next)?;
        }
        self.notify(Notification::SettingsChanged(settings.clone()));
        Ok(())
    }

    /// Events are dropped while local logging is off, and a post URL is
    /// logged at most once.
    fn log_flagged_event(&self, event: &FlaggedEvent) -> Result<()> {
        let mut data = self.data.lock();
        if !data.settings.enable_local_logging {
            log::debug!("Local logging disabled, dropping event for {}", event.post_url);
            return Ok(());
        }
        if !event.post_url.is_empty()
            && data
                .flagged_log
                .iter()
                .any(|logged| logged.post_url == event.post_url)
        {
            log::debug!("Already logged {}", event.post_url);
            return Ok(());
        }

        let mut next = data.clone();
        next.flagged_log.push(event.clone());
        self.commit(&mut data, next)
    }
}
