use crate::progress::RunningAverage;
use anyhow::{Context, Result};
use dirs_next::config_dir;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const STATE_VERSION: u32 = 1;
pub const STATE_FILE: &str = "state.json";
pub const STATE_DIR_ENV: &str = "ECGA_STATE_DIR";

/// Durable client-side state, carried across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Learned processing duration fed to the progress estimator.
    #[serde(
        default,
        rename = "avg_proc_time_s",
        deserialize_with = "lenient_average"
    )]
    pub avg_proc_time: RunningAverage,
    /// Display preference; only affects presentation.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub dark_mode: bool,
}

/// Numbers and numeric strings are accepted; anything else is the default.
fn lenient_average<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RunningAverage, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let seconds = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match seconds {
        Some(seconds) => Ok(RunningAverage::new(seconds)),
        None => {
            warn!("ignoring stored average {}", value);
            Ok(RunningAverage::default())
        }
    }
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn current_version() -> u32 {
    STATE_VERSION
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            avg_proc_time: RunningAverage::default(),
            dark_mode: false,
        }
    }
}

impl ClientState {
    fn normalized(mut self) -> Self {
        if self.version > STATE_VERSION {
            warn!(
                "state file version {} is newer than supported {}; reading known fields",
                self.version, STATE_VERSION
            );
        }
        self.version = STATE_VERSION;
        self.avg_proc_time = RunningAverage::new(self.avg_proc_time.seconds());
        self
    }
}

/// Load/save boundary for [`ClientState`].
pub trait StateStore {
    fn load(&self) -> Result<ClientState>;
    fn save(&self, state: &ClientState) -> Result<()>;
}

/// Directory holding the state file: `$ECGA_STATE_DIR` or `<config_dir>/ecga`.
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let base = config_dir().context("unable to locate config directory")?;
    Ok(base.join("ecga"))
}

/// JSON file store with atomic replacement on save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::in_dir(&state_dir()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    /// A missing or unparsable file yields the default state.
    fn load(&self) -> Result<ClientState> {
        if !self.path.exists() {
            debug!("no state at {}, using defaults", self.path.display());
            return Ok(ClientState::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading state {}", self.path.display()))?;
        match serde_json::from_str::<ClientState>(&contents) {
            Ok(state) => Ok(state.normalized()),
            Err(err) => {
                warn!(
                    "ignoring unreadable state {}: {}",
                    self.path.display(),
                    err
                );
                Ok(ClientState::default())
            }
        }
    }

    fn save(&self, state: &ClientState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.persist(&self.path)
            .with_context(|| format!("writing state {}", self.path.display()))?;
        Ok(())
    }
}

/// Non-persistent store; counts saves so callers can assert on them.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RefCell<ClientState>,
    saves: Cell<usize>,
}

impl MemoryStateStore {
    pub fn new(state: ClientState) -> Self {
        Self {
            state: RefCell::new(state),
            saves: Cell::new(0),
        }
    }

    pub fn snapshot(&self) -> ClientState {
        self.state.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<ClientState> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &ClientState) -> Result<()> {
        *self.state.borrow_mut() = state.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
