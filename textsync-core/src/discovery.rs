//! Discovery: find the remote entity an entry of the configuration maps to.
//!
//! Remote names are derived deterministically from the logical name and the
//! configuration identifier, so an unchanged configuration always searches
//! for the same name. At most one live match is acceptable.

use serde_json::Value;
use tracing::{debug, error, info};

use crate::content::Format;
use crate::contract::{check_status, EntityKind, RemoteClient, RemoteEntity, SearchEnvelope, EXPECT_READ};
use crate::error::SyncError;

/// `{logical_name}-{identifier}[-{format}]`.
pub fn remote_name(logical_name: &str, identifier: &str, format_out: Option<Format>) -> String {
    match format_out {
        Some(format) => format!("{logical_name}-{identifier}-{format}"),
        None => format!("{logical_name}-{identifier}"),
    }
}

/// A locally declared entity that is backed by a remote one.
///
/// The discover/create/adopt flow is written once against this trait; each
/// kind supplies its own naming and content.
pub trait RemoteBacked {
    fn kind(&self) -> EntityKind;

    fn logical_name(&self) -> &str;

    /// Name under which the entity is stored remotely.
    fn remote_name(&self) -> String;

    fn description(&self) -> &str;

    /// Content payload sent on create and update, if the kind has one.
    fn content(&self) -> Option<&Value>;
}

/// Search the owner's entities of `kind` for `pattern`.
///
/// Entities the remote reports as deleted are not candidates.
pub async fn discover<C>(
    client: &C,
    kind: EntityKind,
    pattern: &str,
) -> Result<Option<RemoteEntity>, SyncError>
where
    C: RemoteClient + ?Sized,
{
    let owner = client.owner();
    debug!(%kind, pattern, owner = %owner, "Discovering remote entity");

    let res = client
        .search(&owner, kind, pattern)
        .await
        .map_err(|e| SyncError::transport("search", e))?;
    let envelope: SearchEnvelope = check_status("search", res, EXPECT_READ)?;

    if envelope.kind.is_none() {
        debug!(%kind, pattern, "No remote match");
        return Ok(None);
    }

    let mut live: Vec<RemoteEntity> = envelope
        .data
        .unwrap_or_default()
        .into_iter()
        .filter(|e| !e.deleted)
        .collect();

    match live.len() {
        0 => Ok(None),
        1 => {
            let found = live.remove(0);
            info!(%kind, pattern, uuid = %found.uuid, "Discovered existing remote entity");
            Ok(Some(found))
        }
        count => {
            error!(%kind, pattern, count, "Discovery is ambiguous");
            Err(SyncError::AmbiguousDiscovery {
                kind,
                pattern: pattern.to_owned(),
                count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockRemoteClient, RemoteResponse};
    use serde_json::json;

    fn client_with(reply: Value) -> MockRemoteClient {
        let mut client = MockRemoteClient::new();
        client.expect_owner().return_const("user-1".to_string());
        client
            .expect_search()
            .times(1)
            .returning(move |_, _, _| Ok(RemoteResponse::new(200, reply.clone())));
        client
    }

    #[test]
    fn remote_names_are_deterministic() {
        assert_eq!(remote_name("resume", "abc123", Some(Format::Rst)), "resume-abc123-rst");
        assert_eq!(remote_name("cv", "abc123", None), "cv-abc123");
    }

    #[tokio::test]
    async fn null_kind_means_not_found() {
        let client = client_with(json!({"kind": null, "data": null}));
        let found = discover(&client, EntityKind::Document, "resume-x-html").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn single_match_is_adopted() {
        let client = client_with(json!({
            "kind": "documents",
            "data": [{"uuid": "d-1", "name": "resume-x-html", "description": "r"}]
        }));
        let found = discover(&client, EntityKind::Document, "resume-x-html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.uuid, "d-1");
    }

    #[tokio::test]
    async fn two_matches_are_ambiguous() {
        let client = client_with(json!({
            "kind": "collections",
            "data": [
                {"uuid": "c-1", "name": "cv-x"},
                {"uuid": "c-2", "name": "cv-x"}
            ]
        }));
        let err = discover(&client, EntityKind::Collection, "cv-x").await.unwrap_err();
        assert!(matches!(err, SyncError::AmbiguousDiscovery { count: 2, .. }));
    }

    #[tokio::test]
    async fn deleted_matches_are_ignored() {
        let client = client_with(json!({
            "kind": "documents",
            "data": [{"uuid": "d-1", "name": "resume-x-html", "deleted": true}]
        }));
        let found = discover(&client, EntityKind::Document, "resume-x-html").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn search_is_scoped_to_owner() {
        let mut client = MockRemoteClient::new();
        client.expect_owner().return_const("user-9".to_string());
        client
            .expect_search()
            .withf(|owner, kind, name_like| {
                owner.to_string() == "user-9"
                    && *kind == EntityKind::Collection
                    && name_like.to_string() == "cv-x"
            })
            .times(1)
            .returning(|_, _, _| Ok(RemoteResponse::new(200, json!({"kind": null, "data": []}))));
        assert!(discover(&client, EntityKind::Collection, "cv-x").await.unwrap().is_none());
    }
}
