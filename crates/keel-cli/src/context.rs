//! Shared state for command execution.

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use keel_domain::{FieldRegistry, RecordId, Snapshot, VersionId};
use keel_gatekeeper::lending::lending_registry;
use keel_gatekeeper::Gatekeeper;
use keel_session::{Collaborators, EditSession};
use keel_store::{FileDraftStore, SqliteVersionStore, StoredVersion};
use std::sync::Arc;

/// Session type used by the CLI.
pub type CliSession = EditSession<SqliteVersionStore, FileDraftStore, Gatekeeper>;

/// Everything a command needs.
pub struct Context {
    /// Loaded configuration
    pub config: Config,
    /// Output formatter
    pub formatter: Formatter,
    /// Version store
    pub store: Arc<SqliteVersionStore>,
    /// Field registry
    pub registry: Arc<FieldRegistry>,
}

impl Context {
    /// Open the store and registry named by `config`.
    pub fn new(config: Config, formatter: Formatter) -> Result<Self> {
        let db_path = config.database_path()?;
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteVersionStore::new(&db_path)?);

        let registry = match &config.registry {
            Some(path) => FieldRegistry::from_file(path)?,
            None => lending_registry()?,
        };

        Ok(Self {
            config,
            formatter,
            store,
            registry: Arc::new(registry),
        })
    }

    /// Consistency checker configured from the CLI config.
    pub fn gatekeeper(&self) -> Gatekeeper {
        Gatekeeper::new(self.config.validation.clone(), Arc::clone(&self.registry))
    }

    /// Draft store in the configured directory.
    pub fn drafts(&self) -> Result<FileDraftStore> {
        Ok(FileDraftStore::new(self.config.drafts_dir()?)?)
    }

    /// Current version of a record, or a specific version of it.
    pub fn load_version(&self, record: RecordId, version: Option<&str>) -> Result<StoredVersion> {
        let stored = match version {
            Some(v) => {
                let id = VersionId::from_string(v).map_err(CliError::InvalidInput)?;
                self.store
                    .version(id)?
                    .filter(|stored| stored.record == record)
            }
            None => self.store.latest(record)?,
        };
        stored.ok_or_else(|| CliError::NotFound(record.to_string()))
    }

    /// Latest persisted snapshot, empty for a record with no versions.
    pub fn baseline(&self, record: RecordId) -> Result<Snapshot> {
        Ok(self
            .store
            .latest(record)?
            .map(|stored| stored.snapshot)
            .unwrap_or_default())
    }

    /// Open an editing session over the latest version of `record`.
    pub fn open_session(&self, record: RecordId) -> Result<CliSession> {
        let collaborators = Collaborators {
            persistence: Arc::clone(&self.store),
            drafts: self.drafts()?,
            checker: Arc::new(self.gatekeeper()),
        };
        Ok(EditSession::open(
            self.config.session.clone(),
            record,
            Arc::clone(&self.registry),
            collaborators,
            self.baseline(record)?,
        )?)
    }
}

/// Parse a record id argument.
pub fn parse_record(raw: &str) -> Result<RecordId> {
    RecordId::from_string(raw).map_err(CliError::InvalidInput)
}
