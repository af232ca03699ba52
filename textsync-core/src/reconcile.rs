//! Reconciliation: converge the remote store onto a [`DataConfig`].
//!
//! This module drives the three passes the CLI exposes:
//!   - `ensure` discovers or creates every document, then the collection, then
//!     links all documents to the collection.
//!   - `update` pushes current content and metadata to the entities recorded
//!     in an existing status, without re-running discovery.
//!   - `destroy` deletes everything an existing status references and marks
//!     the records deleted.
//!
//! # Concurrency
//! Document steps of a pass run concurrently and are joined before the
//! collection step, which needs every document id. The join always drains:
//! every in-flight call finishes, all failures are logged, and the failure of
//! the first document in logical-name order is returned. Nothing after the
//! join runs once any document failed.
//!
//! # Error Handling
//! Configuration problems are reported before the first remote call. Any
//! unexpected status aborts the pass; callers persist the returned status only
//! on success.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{CollectionConfig, DataConfig, DocumentConfig};
use crate::contract::{
    check_status, Assignment, EntityKind, EntityPatch, Envelope, NewEntity, RemoteClient,
    RemoteEntity, EXPECT_CREATE, EXPECT_DELETE, EXPECT_READ, EXPECT_UPDATE,
};
use crate::discovery::{discover, remote_name, RemoteBacked};
use crate::error::{ConfigError, SyncError};
use crate::status::{CollectionStatus, DataStatus, DocumentStatus};

/// A document whose content has been built and is ready to send.
struct PreparedDocument {
    name: String,
    config: DocumentConfig,
    remote_name: String,
    payload: Value,
}

impl RemoteBacked for PreparedDocument {
    fn kind(&self) -> EntityKind {
        EntityKind::Document
    }

    fn logical_name(&self) -> &str {
        &self.name
    }

    fn remote_name(&self) -> String {
        self.remote_name.clone()
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn content(&self) -> Option<&Value> {
        Some(&self.payload)
    }
}

struct PreparedCollection<'a> {
    config: &'a CollectionConfig,
    identifier: &'a str,
}

impl RemoteBacked for PreparedCollection<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Collection
    }

    fn logical_name(&self) -> &str {
        &self.config.name
    }

    fn remote_name(&self) -> String {
        remote_name(&self.config.name, self.identifier, None)
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn content(&self) -> Option<&Value> {
        None
    }
}

/// A difference between the ledger and what the remote store reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "drift", rename_all = "snake_case")]
pub enum Drift {
    /// The remote store no longer knows the recorded id.
    Missing {
        kind: EntityKind,
        name: String,
        uuid: String,
    },
    /// The entity exists but is flagged deleted remotely.
    Deleted {
        kind: EntityKind,
        name: String,
        uuid: String,
    },
    /// The remote name differs from the recorded one.
    Renamed {
        kind: EntityKind,
        name: String,
        expected: String,
        actual: String,
    },
    /// The document is not linked to the collection.
    Unassigned { name: String, uuid: String },
}

/// Runs reconciliation passes for one configuration against one client.
pub struct Reconciler<'a, C: ?Sized> {
    client: &'a C,
    config: &'a DataConfig,
}

impl<'a, C> Reconciler<'a, C>
where
    C: RemoteClient + ?Sized,
{
    pub fn new(client: &'a C, config: &'a DataConfig) -> Self {
        Self { client, config }
    }

    /// Create or adopt every document, the collection, and their links.
    pub async fn ensure(&self, names: Option<&[String]>) -> Result<DataStatus, SyncError> {
        if names.is_some() {
            return Err(SyncError::PartialFilterUnsupported {
                operation: "ensure",
            });
        }
        self.config.validate()?;

        let prepared = self
            .config
            .documents
            .iter()
            .map(|(name, document)| self.prepare(name, document.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            identifier = %self.config.identifier,
            documents = prepared.len(),
            "Ensuring documents"
        );
        let results = join_all(
            prepared
                .iter()
                .map(|doc| async move { (doc.name.as_str(), self.ensure_entity(doc).await) }),
        )
        .await;
        let ensured = settle("ensure", results)?;

        let documents: BTreeMap<String, DocumentStatus> = prepared
            .iter()
            .zip(ensured)
            .map(|(doc, remote)| {
                (
                    doc.name.clone(),
                    document_status(&doc.name, &doc.config, remote),
                )
            })
            .collect();

        let collection_config = &self.config.collection;
        let collection = self
            .ensure_entity(&PreparedCollection {
                config: collection_config,
                identifier: &self.config.identifier,
            })
            .await?;

        let document_ids: Vec<String> = documents.values().map(|d| d.uuid.clone()).collect();
        debug!(collection = %collection.uuid, count = document_ids.len(), "Creating assignments (idempotently)");
        let res = self
            .client
            .create_assignments(&collection.uuid, &document_ids)
            .await
            .map_err(|e| SyncError::transport("create_assignments", e))?;
        let created: Envelope<Vec<Assignment>> =
            check_status("create_assignments", res, EXPECT_CREATE)?;
        info!(
            collection = %collection.uuid,
            new_links = created.data.len(),
            "Assignments ensured"
        );

        let assignments: BTreeSet<String> = document_ids.into_iter().collect();
        Ok(DataStatus {
            identifier: self.config.identifier.clone(),
            path_docs: self.config.path_docs.clone(),
            collection: CollectionStatus {
                name: collection_config.name.clone(),
                name_remote: collection.name,
                uuid: collection.uuid,
                deleted: false,
                description: collection_config.description.clone(),
                assignments: assignments.into_iter().collect(),
            },
            documents,
        })
    }

    /// Push current content and metadata to the entities recorded in `status`.
    ///
    /// Only documents named in `names` are updated when a filter is given; the
    /// collection is always updated.
    pub async fn update(
        &self,
        status: &DataStatus,
        names: Option<&[String]>,
    ) -> Result<DataStatus, SyncError> {
        self.config.validate()?;
        if status.identifier != self.config.identifier {
            return Err(ConfigError::IdentifierChanged {
                recorded: status.identifier.clone(),
                configured: self.config.identifier.clone(),
            }
            .into());
        }
        if status.collection.deleted {
            return Err(SyncError::AlreadyDestroyed {
                kind: EntityKind::Collection,
                name: status.collection.name.clone(),
            });
        }

        let selected: Vec<&DocumentStatus> = match names {
            None => status.documents.values().collect(),
            Some(names) => status
                .documents
                .values()
                .filter(|d| names.contains(&d.name))
                .collect(),
        };
        if let Some(names) = names {
            if let Some(unknown) = names.iter().find(|n| status.get(n).is_none()) {
                return Err(ConfigError::UnknownDocument(unknown.clone()).into());
            }
        }
        if let Some(destroyed) = selected.iter().find(|d| d.deleted) {
            return Err(SyncError::AlreadyDestroyed {
                kind: EntityKind::Document,
                name: destroyed.name.clone(),
            });
        }

        let prepared = selected
            .iter()
            .map(|record| {
                let desired = self
                    .config
                    .get(&record.name)
                    .cloned()
                    .unwrap_or_else(|| recorded_config(record));
                self.prepare(&record.name, desired)
                    .map(|doc| (record.uuid.as_str(), doc))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(documents = prepared.len(), "Updating documents");
        let results = join_all(prepared.iter().map(|(uuid, doc)| async move {
            (doc.name.as_str(), self.update_entity(uuid, doc).await)
        }))
        .await;
        let updated = settle("update", results)?;

        let mut out = status.clone();
        for ((uuid, doc), remote) in prepared.iter().zip(updated) {
            let mut record = document_status(&doc.name, &doc.config, remote);
            record.uuid = (*uuid).to_owned();
            out.documents.insert(doc.name.clone(), record);
        }

        let collection_config = &self.config.collection;
        let remote = self
            .update_entity(
                &status.collection.uuid,
                &PreparedCollection {
                    config: collection_config,
                    identifier: &self.config.identifier,
                },
            )
            .await?;
        out.collection.name = collection_config.name.clone();
        out.collection.name_remote = remote.name;
        out.collection.description = collection_config.description.clone();
        out.path_docs = self.config.path_docs.clone();

        Ok(out)
    }

    /// Delete every entity referenced by `status` and mark the records deleted.
    pub async fn destroy(
        &self,
        status: &DataStatus,
        names: Option<&[String]>,
    ) -> Result<DataStatus, SyncError> {
        if names.is_some() {
            return Err(SyncError::PartialFilterUnsupported {
                operation: "destroy",
            });
        }

        let pending: Vec<&DocumentStatus> = status
            .documents
            .values()
            .filter(|d| {
                if d.deleted {
                    debug!(document = %d.name, "Already deleted, skipping");
                }
                !d.deleted
            })
            .collect();

        info!(documents = pending.len(), "Destroying documents");
        let results = join_all(pending.iter().map(|record| async move {
            (
                record.name.as_str(),
                self.delete_entity(EntityKind::Document, &record.uuid).await,
            )
        }))
        .await;
        settle("destroy", results)?;

        if status.collection.deleted {
            debug!(collection = %status.collection.name, "Already deleted, skipping");
        } else {
            self.delete_entity(EntityKind::Collection, &status.collection.uuid)
                .await?;
        }

        let mut out = status.clone();
        for record in out.documents.values_mut() {
            record.deleted = true;
        }
        out.collection.deleted = true;
        info!(identifier = %out.identifier, "Destroyed all recorded entities");
        Ok(out)
    }

    /// Compare `status` with what the remote store reports.
    pub async fn verify(&self, status: &DataStatus) -> Result<Vec<Drift>, SyncError> {
        let live: Vec<&DocumentStatus> = status.documents.values().filter(|d| !d.deleted).collect();

        let results = join_all(live.iter().map(|record| async move {
            let found = self
                .drift_of(
                    EntityKind::Document,
                    &record.name,
                    &record.uuid,
                    &record.name_remote,
                )
                .await;
            (record.name.as_str(), found.map(|found| (*record, found)))
        }))
        .await;

        // Documents the remote no longer serves are reported once, not again as unassigned.
        let mut drift = Vec::new();
        let mut present: Vec<&DocumentStatus> = Vec::with_capacity(live.len());
        for (record, found) in settle("verify", results)? {
            match found {
                Some(gone @ (Drift::Missing { .. } | Drift::Deleted { .. })) => drift.push(gone),
                Some(renamed) => {
                    drift.push(renamed);
                    present.push(record);
                }
                None => present.push(record),
            }
        }

        if status.collection.deleted {
            return Ok(drift);
        }
        let collection = &status.collection;
        if let Some(found) = self
            .drift_of(
                EntityKind::Collection,
                &collection.name,
                &collection.uuid,
                &collection.name_remote,
            )
            .await?
        {
            drift.push(found);
            return Ok(drift);
        }

        let document_ids: Vec<String> = present.iter().map(|d| d.uuid.clone()).collect();
        if document_ids.is_empty() {
            return Ok(drift);
        }
        let res = self
            .client
            .read_assignments(&collection.uuid, &document_ids)
            .await
            .map_err(|e| SyncError::transport("read_assignments", e))?;
        let assignments: Envelope<Vec<Assignment>> =
            check_status("read_assignments", res, EXPECT_READ)?;
        let linked: BTreeSet<&str> = assignments
            .data
            .iter()
            .filter(|a| !a.deleted)
            .map(|a| a.uuid_document.as_str())
            .collect();
        drift.extend(
            present
                .iter()
                .filter(|d| !linked.contains(d.uuid.as_str()))
                .map(|d| Drift::Unassigned {
                    name: d.name.clone(),
                    uuid: d.uuid.clone(),
                }),
        );

        if drift.is_empty() {
            info!("No drift detected");
        } else {
            warn!(count = drift.len(), "Drift detected");
        }
        Ok(drift)
    }

    fn prepare(&self, name: &str, config: DocumentConfig) -> Result<PreparedDocument, SyncError> {
        let content = config.create_content(name, &self.config.path_docs)?;
        Ok(PreparedDocument {
            name: name.to_owned(),
            remote_name: remote_name(name, &self.config.identifier, Some(config.format_out)),
            payload: content.to_payload(),
            config,
        })
    }

    /// Adopt the single discovered match, or create the entity.
    async fn ensure_entity<E>(&self, entity: &E) -> Result<RemoteEntity, SyncError>
    where
        E: RemoteBacked + ?Sized,
    {
        let kind = entity.kind();
        let name = entity.remote_name();
        if let Some(found) = discover(self.client, kind, &name).await? {
            debug!(%kind, logical_name = entity.logical_name(), uuid = %found.uuid, "Adopting existing entity");
            return Ok(found);
        }

        info!(%kind, logical_name = entity.logical_name(), remote_name = %name, "Creating remote entity");
        let res = self
            .client
            .create(NewEntity {
                kind,
                name: &name,
                description: entity.description(),
                content: entity.content(),
                public: false,
            })
            .await
            .map_err(|e| SyncError::transport("create", e))?;
        let created: Envelope<RemoteEntity> = check_status("create", res, EXPECT_CREATE)?;
        info!(%kind, uuid = %created.data.uuid, "Created remote entity");
        Ok(created.data)
    }

    async fn update_entity<E>(&self, uuid: &str, entity: &E) -> Result<RemoteEntity, SyncError>
    where
        E: RemoteBacked + ?Sized,
    {
        let kind = entity.kind();
        let name = entity.remote_name();
        info!(%kind, %uuid, remote_name = %name, "Updating remote entity");
        let res = self
            .client
            .update(
                kind,
                uuid,
                EntityPatch {
                    name: Some(&name),
                    description: Some(entity.description()),
                    content: entity.content(),
                },
            )
            .await
            .map_err(|e| SyncError::transport("update", e))?;
        let updated: Envelope<RemoteEntity> = check_status("update", res, EXPECT_UPDATE)?;
        Ok(updated.data)
    }

    async fn delete_entity(&self, kind: EntityKind, uuid: &str) -> Result<(), SyncError> {
        info!(%kind, %uuid, "Deleting remote entity");
        let res = self
            .client
            .delete(kind, uuid)
            .await
            .map_err(|e| SyncError::transport("delete", e))?;
        check_status::<Value>("delete", res, EXPECT_DELETE)?;
        Ok(())
    }

    async fn drift_of(
        &self,
        kind: EntityKind,
        name: &str,
        uuid: &str,
        name_remote: &str,
    ) -> Result<Option<Drift>, SyncError> {
        let res = self
            .client
            .read(kind, uuid)
            .await
            .map_err(|e| SyncError::transport("read", e))?;
        if res.status == 404 {
            return Ok(Some(Drift::Missing {
                kind,
                name: name.to_owned(),
                uuid: uuid.to_owned(),
            }));
        }
        let found: Envelope<RemoteEntity> = check_status("read", res, EXPECT_READ)?;
        let found = found.data;
        if found.deleted {
            return Ok(Some(Drift::Deleted {
                kind,
                name: name.to_owned(),
                uuid: uuid.to_owned(),
            }));
        }
        if found.name != name_remote {
            return Ok(Some(Drift::Renamed {
                kind,
                name: name.to_owned(),
                expected: name_remote.to_owned(),
                actual: found.name,
            }));
        }
        Ok(None)
    }
}

/// Join point for concurrent document steps. Every task has already run to
/// completion; all failures are logged and the first one (in the order the
/// tasks were issued) is returned.
fn settle<T>(
    operation: &'static str,
    results: Vec<(&str, Result<T, SyncError>)>,
) -> Result<Vec<T>, SyncError> {
    let mut succeeded = Vec::with_capacity(results.len());
    let mut first = None;
    let mut failed = 0usize;

    for (name, result) in results {
        match result {
            Ok(value) => succeeded.push(value),
            Err(e) => {
                error!(operation, document = name, error = %e, "Document step failed");
                failed += 1;
                first.get_or_insert(e);
            }
        }
    }

    match first {
        Some(e) => {
            if failed > 1 {
                error!(operation, failed, "Several documents failed; reporting the first");
            }
            Err(e)
        }
        None => Ok(succeeded),
    }
}

fn document_status(name: &str, config: &DocumentConfig, remote: RemoteEntity) -> DocumentStatus {
    DocumentStatus {
        name: name.to_owned(),
        name_remote: remote.name,
        uuid: remote.uuid,
        deleted: false,
        description: config.description.clone(),
        content_file: config.content_file.clone(),
        format_in: config.format_in,
        format_out: config.format_out,
        tags: config.tags.clone(),
    }
}

/// Desired fields of a document that is recorded but no longer configured.
fn recorded_config(record: &DocumentStatus) -> DocumentConfig {
    DocumentConfig {
        content_file: record.content_file.clone(),
        description: record.description.clone(),
        format_in: record.format_in,
        format_out: record.format_out,
        tags: record.tags.clone(),
    }
}
