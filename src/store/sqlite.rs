//! SQLite store implementation using Diesel.

use chrono::Utc;
use diesel::prelude::*;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::db::{create_pool, ensure_schema, DbPool};
use super::model::NodeRow;
use super::schema::nodes;
use super::NodeStore;
use crate::domain::{NodeSnapshot, Soul};
use crate::error::StoreError;

/// SQLite-backed node store.
///
/// One row per soul. The pool sits behind a lock so the liveness monitor can
/// swap it out wholesale on reconnect without disturbing other components'
/// handles to the store.
pub struct SqliteNodeStore {
    pool: RwLock<DbPool>,
    database_url: String,
    pool_size: u32,
}

impl SqliteNodeStore {
    /// Open the database, building the pool and applying migrations.
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let pool = create_pool(database_url, pool_size)?;
        ensure_schema(&pool)?;
        Ok(Self {
            pool: RwLock::new(pool),
            database_url: database_url.to_string(),
            pool_size,
        })
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>, StoreError>
    {
        self.pool
            .read()
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn parse_payload(soul: &str, payload: &str) -> Result<NodeSnapshot, StoreError> {
        serde_json::from_str(payload).map_err(|e| StoreError::CorruptRow {
            soul: soul.to_string(),
            reason: e.to_string(),
        })
    }
}

impl NodeStore for SqliteNodeStore {
    async fn get(&self, soul: &Soul) -> Result<Option<NodeSnapshot>, StoreError> {
        let mut conn = self.conn()?;

        let row: Option<NodeRow> = nodes::table
            .find(soul.as_str())
            .first(&mut conn)
            .optional()?;

        row.map(|r| Self::parse_payload(&r.soul, &r.payload))
            .transpose()
    }

    async fn upsert(&self, soul: &Soul, patch: &NodeSnapshot) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let updated_at = Utc::now().to_rfc3339();

        // Read-merge-write inside one immediate transaction so two upserts
        // for the same soul never interleave field updates destructively.
        conn.immediate_transaction::<_, StoreError, _>(|conn| {
            let existing: Option<String> = nodes::table
                .find(soul.as_str())
                .select(nodes::payload)
                .first(conn)
                .optional()?;

            let mut snapshot = match existing {
                Some(text) => match serde_json::from_str(&text) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        // A permanently bad row must not wedge the flush
                        // retry loop; the patch becomes the new snapshot.
                        warn!(soul = %soul, error = %e, "replacing corrupt stored payload");
                        NodeSnapshot::new()
                    }
                },
                None => NodeSnapshot::new(),
            };
            snapshot.merge_from(patch.clone());

            let payload = serde_json::to_string(&snapshot)
                .map_err(|e| StoreError::Database(e.to_string()))?;

            diesel::replace_into(nodes::table)
                .values(&NodeRow {
                    soul: soul.to_string(),
                    payload,
                    updated_at: updated_at.clone(),
                })
                .execute(conn)?;

            Ok(())
        })
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Soul, NodeSnapshot)>, StoreError> {
        let mut conn = self.conn()?;

        let rows: Vec<NodeRow> = nodes::table
            .filter(nodes::soul.like(format!("{prefix}%")))
            .order(nodes::soul.asc())
            .load(&mut conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::parse_payload(&row.soul, &row.payload) {
                Ok(snapshot) => out.push((Soul::new(row.soul), snapshot)),
                Err(e) => warn!(error = %e, "skipping corrupt row in prefix scan"),
            }
        }
        Ok(out)
    }

    async fn row_count(&self) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        let count = nodes::table.count().get_result(&mut conn)?;
        Ok(count)
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), StoreError> {
        let pool = create_pool(&self.database_url, self.pool_size)?;
        ensure_schema(&pool)?;
        *self.pool.write() = pool;
        info!(database_url = %self.database_url, "store connection rebuilt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;

    fn setup_store() -> SqliteNodeStore {
        // pool_size 1 keeps a single in-memory database alive across calls
        SqliteNodeStore::connect(":memory:", 1).expect("store")
    }

    fn snapshot_of(fields: &[(&str, FieldValue)]) -> NodeSnapshot {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn get_absent_soul_returns_none() {
        let store = setup_store();
        let got = store.get(&Soul::new("users/nobody")).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn upsert_merges_field_wise() {
        let store = setup_store();
        let soul = Soul::new("users/alice");

        store
            .upsert(&soul, &snapshot_of(&[("a", FieldValue::Number(1.0))]))
            .await
            .unwrap();
        store
            .upsert(&soul, &snapshot_of(&[("b", FieldValue::Number(2.0))]))
            .await
            .unwrap();

        let got = store.get(&soul).await.unwrap().expect("row");
        assert_eq!(got.get("a"), Some(&FieldValue::Number(1.0)));
        assert_eq!(got.get("b"), Some(&FieldValue::Number(2.0)));
    }

    #[tokio::test]
    async fn upsert_overwrites_present_fields_only() {
        let store = setup_store();
        let soul = Soul::new("users/alice");

        store
            .upsert(
                &soul,
                &snapshot_of(&[("name", "alice".into()), ("age", 30.0.into())]),
            )
            .await
            .unwrap();
        store
            .upsert(&soul, &snapshot_of(&[("age", 31.0.into())]))
            .await
            .unwrap();

        let got = store.get(&soul).await.unwrap().expect("row");
        assert_eq!(got.get("name"), Some(&FieldValue::Text("alice".into())));
        assert_eq!(got.get("age"), Some(&FieldValue::Number(31.0)));
    }

    #[tokio::test]
    async fn corrupt_payload_surfaces_as_corrupt_row() {
        let store = setup_store();
        let soul = Soul::new("users/broken");

        {
            let mut conn = store.conn().unwrap();
            diesel::replace_into(nodes::table)
                .values(&NodeRow {
                    soul: soul.to_string(),
                    payload: "not json".to_string(),
                    updated_at: Utc::now().to_rfc3339(),
                })
                .execute(&mut conn)
                .unwrap();
        }

        let err = store.get(&soul).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { .. }));
    }

    #[tokio::test]
    async fn upsert_replaces_corrupt_payload() {
        let store = setup_store();
        let soul = Soul::new("users/broken");

        {
            let mut conn = store.conn().unwrap();
            diesel::replace_into(nodes::table)
                .values(&NodeRow {
                    soul: soul.to_string(),
                    payload: "{{{".to_string(),
                    updated_at: Utc::now().to_rfc3339(),
                })
                .execute(&mut conn)
                .unwrap();
        }

        store
            .upsert(&soul, &snapshot_of(&[("fixed", true.into())]))
            .await
            .unwrap();

        let got = store.get(&soul).await.unwrap().expect("row");
        assert_eq!(got.get("fixed"), Some(&FieldValue::Bool(true)));
    }

    #[tokio::test]
    async fn scan_prefix_returns_namespace_members() {
        let store = setup_store();
        for id in ["users/alice", "users/bob", "rooms/lobby"] {
            store
                .upsert(&Soul::new(id), &snapshot_of(&[("x", 1.0.into())]))
                .await
                .unwrap();
        }

        let hits = store.scan_prefix("users/").await.unwrap();
        let souls: Vec<&str> = hits.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(souls, vec!["users/alice", "users/bob"]);
    }

    #[tokio::test]
    async fn row_count_tracks_upserts() {
        let store = setup_store();
        assert_eq!(store.row_count().await.unwrap(), 0);

        store
            .upsert(&Soul::new("a"), &snapshot_of(&[("x", 1.0.into())]))
            .await
            .unwrap();
        store
            .upsert(&Soul::new("a"), &snapshot_of(&[("y", 2.0.into())]))
            .await
            .unwrap();
        store
            .upsert(&Soul::new("b"), &snapshot_of(&[("x", 1.0.into())]))
            .await
            .unwrap();

        assert_eq!(store.row_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn probe_succeeds_on_open_store() {
        let store = setup_store();
        assert!(store.probe().await.is_ok());
    }
}
