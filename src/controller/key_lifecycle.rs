//! # Key Lifecycle
//!
//! Sources the ejson transport key pair and the per-service application
//! keys according to the CR's [`KeysAction`].
//!
//! | Action            | ejson pair                                 | application keys                    |
//! |-------------------|--------------------------------------------|-------------------------------------|
//! | `DoNothing`       | environment key or the single local file   | untouched                           |
//! | `RestoreOrRotate` | restore from backup, generate on not-found | restore, generate + backup on not-found |
//! | `ForceRotate`     | generate                                   | generate + backup                   |
//!
//! The key directory holds at most one file, named by the public key. It is
//! emptied before every rewrite.

use crate::config::OperatorConfig;
use crate::constants::{EJSON_KEYS_BACKUP_KEY, KEYS_DIR, OPERATOR_KEYS_BACKUP_KEY};
use crate::crd::{KeysAction, Qliksense};
use crate::ejson::EjsonKeyPair;
use crate::error::{IoContext, OperatorError, Result};
use crate::keys::KeyGenerator;
use crate::observability::metrics;
use crate::qust::{self, operator_dir};
use crate::state::{self, BackupEntry, BackupStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the ejson key pair of a pass came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Matched against the environment-injected private key
    Environment,
    /// The only file of the local key directory
    LocalDirectory,
    Restored,
    Generated,
}

impl KeySource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeySource::Environment => "environment",
            KeySource::LocalDirectory => "local",
            KeySource::Restored => "restored",
            KeySource::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedEjsonKeys {
    pub pair: EjsonKeyPair,
    pub source: KeySource,
}

impl ResolvedEjsonKeys {
    #[must_use]
    pub fn public_key(&self) -> &str {
        self.pair.public_key()
    }

    #[must_use]
    pub fn was_generated(&self) -> bool {
        self.source == KeySource::Generated
    }
}

/// What happened to the application keys in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Skipped,
    Restored,
    /// Generated and backed up together with the ejson pair
    Generated,
}

#[derive(Clone)]
pub struct KeyLifecycle {
    config: OperatorConfig,
    store: Arc<dyn BackupStore>,
    generator: Arc<dyn KeyGenerator>,
}

impl std::fmt::Debug for KeyLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLifecycle")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KeyLifecycle {
    pub fn new(
        config: OperatorConfig,
        store: Arc<dyn BackupStore>,
        generator: Arc<dyn KeyGenerator>,
    ) -> Self {
        Self {
            config,
            store,
            generator,
        }
    }

    fn release_label<'a>(&'a self, cr: &'a Qliksense) -> &'a str {
        match cr.metadata.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.config.release_label_default,
        }
    }

    /// Settle the ejson key pair. Must complete before secrets are rendered.
    pub async fn resolve_ejson_keys(
        &self,
        cr: &Qliksense,
        action: KeysAction,
    ) -> Result<ResolvedEjsonKeys> {
        let resolved = match action {
            KeysAction::DoNothing => self.local_ejson_keys()?,
            KeysAction::RestoreOrRotate => match self.restore_ejson_keys(cr).await {
                Ok(pair) => ResolvedEjsonKeys {
                    pair,
                    source: KeySource::Restored,
                },
                Err(e) if e.is_not_found() => {
                    info!(reason = %e, "No ejson key backup, generating a new pair");
                    self.generate_ejson_keys()?
                }
                Err(e) => {
                    metrics::record_key_operation("ejson", "error");
                    return Err(e);
                }
            },
            KeysAction::ForceRotate => self.generate_ejson_keys()?,
        };
        metrics::record_key_operation("ejson", resolved.source.as_str());
        info!(
            action = %action,
            source = resolved.source.as_str(),
            public_key = %resolved.public_key(),
            "Resolved ejson key pair"
        );
        Ok(resolved)
    }

    /// Restore or regenerate application keys. Must run after every patch
    /// renderer, since it writes under `.operator/keys`.
    pub async fn finalize_keys(
        &self,
        cr: &Qliksense,
        action: KeysAction,
        ejson: &ResolvedEjsonKeys,
    ) -> Result<FinalizeOutcome> {
        if action == KeysAction::DoNothing {
            debug!("No application key operations");
            metrics::record_key_operation("application", "skipped");
            return Ok(FinalizeOutcome::Skipped);
        }

        let keys_dir = operator_dir(cr.spec.manifests_root(), KEYS_DIR);
        if action == KeysAction::RestoreOrRotate && !ejson.was_generated() {
            let entries = [BackupEntry::new(OPERATOR_KEYS_BACKUP_KEY, &keys_dir)];
            match state::restore(self.store.as_ref(), &cr.backup_object_name(), &entries).await {
                Ok(()) => {
                    metrics::record_key_operation("application", "restored");
                    info!("Restored application keys from backup");
                    return Ok(FinalizeOutcome::Restored);
                }
                Err(e) if e.is_not_found() => {
                    info!(reason = %e, "No application key backup, generating");
                }
                Err(e) => {
                    metrics::record_key_operation("application", "error");
                    return Err(e);
                }
            }
        }

        qust::generate_application_keys(&cr.spec, ejson.public_key(), self.generator.as_ref())?;
        info!("Backing up keys");
        state::backup(
            self.store.as_ref(),
            &cr.backup_object_name(),
            self.release_label(cr),
            &[
                BackupEntry::new(OPERATOR_KEYS_BACKUP_KEY, &keys_dir),
                BackupEntry::new(EJSON_KEYS_BACKUP_KEY, &self.config.ejson_key_dir),
            ],
        )
        .await?;
        metrics::record_key_operation("application", "generated");
        Ok(FinalizeOutcome::Generated)
    }

    /// Both key categories without rendering any patch
    pub async fn reconcile_keys(
        &self,
        cr: &Qliksense,
        action: KeysAction,
    ) -> Result<(ResolvedEjsonKeys, FinalizeOutcome)> {
        let ejson = self.resolve_ejson_keys(cr, action).await?;
        let outcome = self.finalize_keys(cr, action, &ejson).await?;
        Ok((ejson, outcome))
    }

    /// Remove the CR's backup object. Returns false when there was none.
    pub async fn delete_backup(&self, cr: &Qliksense) -> Result<bool> {
        let name = cr.backup_object_name();
        match self.store.delete(&name).await {
            Ok(()) => {
                metrics::increment_backup_operations("delete");
                info!(object = %name, "Deleted backup object");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(object = %name, "No backup object to delete");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn local_ejson_keys(&self) -> Result<ResolvedEjsonKeys> {
        let dir = &self.config.ejson_key_dir;
        let files = key_files(dir).map_err(|e| {
            OperatorError::NoUsableKeyFound(format!("cannot list {}: {e}", dir.display()))
        })?;

        if let Some(private_key) = &self.config.ejson_private_key {
            for name in &files {
                let content = read_key_file(&dir.join(name))?;
                if content.trim() == private_key.trim() {
                    return Ok(ResolvedEjsonKeys {
                        pair: EjsonKeyPair::new(name.clone(), content.as_str()),
                        source: KeySource::Environment,
                    });
                }
            }
            return Err(OperatorError::NoUsableKeyFound(format!(
                "no file in {} matches the injected private key",
                dir.display()
            )));
        }

        match files.as_slice() {
            [name] => {
                let content = read_key_file(&dir.join(name))?;
                Ok(ResolvedEjsonKeys {
                    pair: EjsonKeyPair::new(name.clone(), content.as_str()),
                    source: KeySource::LocalDirectory,
                })
            }
            [] => Err(OperatorError::NoUsableKeyFound(format!(
                "{} holds no key file",
                dir.display()
            ))),
            _ => Err(OperatorError::NoUsableKeyFound(format!(
                "{} holds {} key files and no private key was injected",
                dir.display(),
                files.len()
            ))),
        }
    }

    async fn restore_ejson_keys(&self, cr: &Qliksense) -> Result<EjsonKeyPair> {
        let staging = tempfile::TempDir::new().io_context(|| "creating restore staging directory".to_string())?;
        state::restore(
            self.store.as_ref(),
            &cr.backup_object_name(),
            &[BackupEntry::new(EJSON_KEYS_BACKUP_KEY, staging.path())],
        )
        .await?;

        let files = key_files(staging.path()).io_context(|| "listing restored ejson keys".to_string())?;
        let Some(name) = files.first() else {
            return Err(OperatorError::NoUsableKeyFound(
                "ejson key backup holds no key file".to_string(),
            ));
        };
        let pair = EjsonKeyPair::new(name.clone(), read_key_file(&staging.path().join(name))?.as_str());
        if !pair.is_consistent() {
            warn!(public_key = %pair.public_key(), "Restored ejson private key does not derive its file name");
        }
        self.rewrite_key_dir(&pair)?;
        Ok(pair)
    }

    fn generate_ejson_keys(&self) -> Result<ResolvedEjsonKeys> {
        let pair = self.generator.ejson_key_pair()?;
        self.rewrite_key_dir(&pair)?;
        Ok(ResolvedEjsonKeys {
            pair,
            source: KeySource::Generated,
        })
    }

    /// Empty the key directory, then write the private key under its public key
    fn rewrite_key_dir(&self, pair: &EjsonKeyPair) -> Result<()> {
        let dir = &self.config.ejson_key_dir;
        std::fs::create_dir_all(dir).io_context(|| format!("creating {}", dir.display()))?;
        clean_dir(dir)?;
        let path = dir.join(pair.public_key());
        std::fs::write(&path, pair.private_key()).io_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), "Wrote ejson key file");
        Ok(())
    }
}

/// Sorted names of the regular files in `dir`
fn key_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn read_key_file(path: &Path) -> Result<zeroize::Zeroizing<String>> {
    std::fs::read_to_string(path)
        .map(zeroize::Zeroizing::new)
        .io_context(|| format!("reading {}", path.display()))
}

fn clean_dir(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir).io_context(|| format!("listing {}", dir.display()))? {
        let path = entry.io_context(|| format!("listing {}", dir.display()))?.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.io_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}
