use std::sync::Arc;

use crate::bail;
use crate::error::{ErrorKind, UpsertResult};
use crate::store::{PendingVersion, VersionStore};
use crate::types::{KeyedRow, Version, VersionEntry};

/// Failure injected by [`FaultInjectingStore`].
#[derive(Debug, Clone, Copy)]
pub enum FaultType {
    Panic,
    Error,
}

/// Selects which store operations fail.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    pub read_version: Option<FaultType>,
    pub commit: Option<FaultType>,
}

/// Wraps a store and fails the configured operations before they reach it.
#[derive(Debug, Clone)]
pub struct FaultInjectingStore<S> {
    inner: S,
    config: Arc<FaultConfig>,
}

impl<S> FaultInjectingStore<S> {
    pub fn wrap(inner: S, config: FaultConfig) -> Self {
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn get_inner(&self) -> &S {
        &self.inner
    }

    fn trigger(fault: Option<FaultType>) -> UpsertResult<()> {
        match fault {
            Some(FaultType::Panic) => panic!("Fault injection: panic triggered"),
            Some(FaultType::Error) => bail!(
                ErrorKind::IoError,
                "Fault injection: error triggered",
                "injected by FaultInjectingStore"
            ),
            None => Ok(()),
        }
    }
}

impl<S> VersionStore for FaultInjectingStore<S>
where
    S: VersionStore,
{
    async fn latest_version(&self, table: &str) -> UpsertResult<Option<Version>> {
        self.inner.latest_version(table).await
    }

    async fn versions(&self, table: &str) -> UpsertResult<Vec<Version>> {
        self.inner.versions(table).await
    }

    async fn entry(&self, table: &str, version: Version) -> UpsertResult<VersionEntry> {
        self.inner.entry(table, version).await
    }

    async fn read_version(
        &self,
        table: &str,
        version: Version,
    ) -> UpsertResult<(VersionEntry, Arc<Vec<KeyedRow>>)> {
        Self::trigger(self.config.read_version)?;
        self.inner.read_version(table, version).await
    }

    async fn commit(&self, table: &str, pending: PendingVersion) -> UpsertResult<VersionEntry> {
        Self::trigger(self.config.commit)?;
        self.inner.commit(table, pending).await
    }
}
