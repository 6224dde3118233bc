//! SQLite mirror of the device registry.
//!
//! One row per device, upserted opportunistically after refreshes and
//! mutations. The mirror is never authoritative for live state; its job
//! is surviving restarts (operator-assigned names in particular).
//! Callers treat failures as best-effort: log and move on.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Row};

use matterlink_core::Device;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS devices (
    node_id     INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    device_type TEXT    NOT NULL,
    endpoint_id INTEGER NOT NULL,
    is_online   INTEGER NOT NULL,
    state       TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
)";

/// One persisted device row.
#[derive(Debug, Clone, FromRow)]
pub struct MirrorRecord {
    pub node_id: i64,
    pub name: String,
    pub device_type: String,
    pub endpoint_id: i64,
    pub is_online: bool,
    /// Serialized functional state blob.
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Mirror {
    pool: SqlitePool,
}

impl Mirror {
    /// Open (creating if missing) and migrate the mirror database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!(url, "device mirror ready");
        Ok(Self { pool })
    }

    /// Insert or replace one device row.
    pub async fn upsert(&self, device: &Device) -> Result<(), sqlx::Error> {
        let state = serde_json::to_string(&device.state)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT INTO devices (node_id, name, device_type, endpoint_id, is_online, state, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(node_id) DO UPDATE SET
                 name = excluded.name,
                 device_type = excluded.device_type,
                 endpoint_id = excluded.endpoint_id,
                 is_online = excluded.is_online,
                 state = excluded.state,
                 updated_at = excluded.updated_at",
        )
        .bind(node_id_column(device.node_id)?)
        .bind(&device.name)
        .bind(device.device_type.as_str())
        .bind(i64::from(device.endpoint_id))
        .bind(device.is_online)
        .bind(state)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mirror a full registry snapshot: upsert every device and prune
    /// rows for devices no longer present.
    pub async fn sync(&self, devices: &[Arc<Device>]) -> Result<(), sqlx::Error> {
        let mut present = Vec::with_capacity(devices.len());
        for device in devices {
            self.upsert(device).await?;
            present.push(node_id_column(device.node_id)?);
        }

        let rows = sqlx::query("SELECT node_id FROM devices")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let node_id: i64 = row.try_get("node_id")?;
            if !present.contains(&node_id) {
                sqlx::query("DELETE FROM devices WHERE node_id = ?1")
                    .bind(node_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn get(&self, node_id: u64) -> Result<Option<MirrorRecord>, sqlx::Error> {
        sqlx::query_as::<_, MirrorRecord>("SELECT * FROM devices WHERE node_id = ?1")
            .bind(node_id_column(node_id)?)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn all(&self) -> Result<Vec<MirrorRecord>, sqlx::Error> {
        sqlx::query_as::<_, MirrorRecord>("SELECT * FROM devices ORDER BY node_id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn delete(&self, node_id: u64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM devices WHERE node_id = ?1")
            .bind(node_id_column(node_id)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a rename without touching the rest of the row.
    pub async fn rename(&self, node_id: u64, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE devices SET name = ?2, updated_at = ?3 WHERE node_id = ?1")
            .bind(node_id_column(node_id)?)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// SQLite integers are signed; node identifiers out of `i64` range
/// cannot be mirrored.
fn node_id_column(node_id: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(node_id)
        .map_err(|_| sqlx::Error::Protocol(format!("node id {node_id} exceeds mirror range")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use matterlink_core::{DeviceState, DeviceType};
    use pretty_assertions::assert_eq;

    async fn mirror() -> (tempfile::TempDir, Mirror) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/mirror.db", dir.path().display());
        let mirror = Mirror::connect(&url).await.unwrap();
        (dir, mirror)
    }

    fn device(node_id: u64, name: &str) -> Device {
        Device {
            node_id,
            name: name.to_owned(),
            device_type: DeviceType::DimmableLight,
            is_online: true,
            endpoint_id: 1,
            state: DeviceState {
                on: Some(true),
                brightness: Some(50),
            },
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let (_dir, mirror) = mirror().await;
        mirror.upsert(&device(7, "Porch")).await.unwrap();

        let record = mirror.get(7).await.unwrap().unwrap();
        assert_eq!(record.node_id, 7);
        assert_eq!(record.name, "Porch");
        assert_eq!(record.device_type, "dimmable_light");
        assert!(record.is_online);

        let state: DeviceState = serde_json::from_str(&record.state).unwrap();
        assert_eq!(state.brightness, Some(50));
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let (_dir, mirror) = mirror().await;
        mirror.upsert(&device(7, "Porch")).await.unwrap();

        let mut updated = device(7, "Front Porch");
        updated.is_online = false;
        mirror.upsert(&updated).await.unwrap();

        let all = mirror.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Front Porch");
        assert!(!all[0].is_online);
    }

    #[tokio::test]
    async fn sync_prunes_vanished_devices() {
        let (_dir, mirror) = mirror().await;
        mirror.upsert(&device(1, "A")).await.unwrap();
        mirror.upsert(&device(2, "B")).await.unwrap();

        let survivors = [Arc::new(device(2, "B")), Arc::new(device(3, "C"))];
        mirror.sync(&survivors).await.unwrap();

        let ids: Vec<i64> = mirror.all().await.unwrap().iter().map(|r| r.node_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let (_dir, mirror) = mirror().await;
        mirror.upsert(&device(7, "Porch")).await.unwrap();

        mirror.rename(7, "Garden").await.unwrap();
        assert_eq!(mirror.get(7).await.unwrap().unwrap().name, "Garden");

        mirror.delete(7).await.unwrap();
        assert!(mirror.get(7).await.unwrap().is_none());
    }
}
