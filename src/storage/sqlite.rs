//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers (scheduler, API) don't block the poller's writes
//! - **Connection pooling**: Shared by all actors
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Timestamps are stored as Unix milliseconds; IP addresses and enums as text.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{
    AlertSink, DeviceInventory, HealthStatus, InventoryAdmin, LogStore, MetricStore, QueryRange,
    RuleRepository, StorageBackend, TopologyStore,
};
use super::error::{StorageError, StorageResult};
use super::schema::{
    AlertEvent, DeviceSeed, RuleRecord, RuleSeed, SyslogRecord, TopologyLink, UpsertOutcome,
};
use crate::{Device, DeviceId, DeviceMetrics, DeviceStatus, InterfaceSample, MetricSample};

const DEVICE_COLUMNS: &str = "id, name, management_ip, snmp_enabled, snmp_community, \
                              snmp_version, status, last_seen";

const METRIC_COLUMNS: &str = "device_id, collector_id, timestamp, status, cpu_usage, \
                              memory_usage, disk_usage, latency, packet_loss";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path` and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn device_from_row(row: &SqliteRow) -> StorageResult<Device> {
        let ip_text: String = row.try_get("management_ip")?;
        let management_ip = ip_text
            .parse::<IpAddr>()
            .map_err(|e| StorageError::InvalidRow(format!("management_ip {ip_text:?}: {e}")))?;

        let version_text: String = row.try_get("snmp_version")?;
        let status_text: String = row.try_get("status")?;

        Ok(Device {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            management_ip,
            snmp_enabled: row.try_get("snmp_enabled")?,
            snmp_community: row.try_get("snmp_community")?,
            snmp_version: version_text.parse().map_err(StorageError::InvalidRow)?,
            status: status_text.parse().map_err(StorageError::InvalidRow)?,
            last_seen: row
                .try_get::<Option<i64>, _>("last_seen")?
                .map(Self::millis_to_timestamp),
        })
    }

    fn metric_from_row(row: &SqliteRow) -> StorageResult<MetricSample> {
        let status_text: String = row.try_get("status")?;

        Ok(MetricSample {
            device_id: row.try_get("device_id")?,
            collector_id: row.try_get("collector_id")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
            status: status_text.parse().map_err(StorageError::InvalidRow)?,
            cpu_usage: row.try_get("cpu_usage")?,
            memory_usage: row.try_get("memory_usage")?,
            disk_usage: row.try_get("disk_usage")?,
            latency: row.try_get("latency")?,
            packet_loss: row.try_get("packet_loss")?,
        })
    }

    fn alert_from_row(row: &SqliteRow) -> StorageResult<AlertEvent> {
        let status_text: String = row.try_get("status")?;
        let details_text: String = row.try_get("details")?;

        Ok(AlertEvent {
            id: Some(row.try_get("id")?),
            rule_id: row.try_get("rule_id")?,
            rule_name: row.try_get("rule_name")?,
            device_id: row.try_get("device_id")?,
            severity: row.try_get("severity")?,
            status: status_text.parse().map_err(StorageError::InvalidRow)?,
            message: row.try_get("message")?,
            details: serde_json::from_str(&details_text)?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?),
        })
    }

    fn link_from_row(row: &SqliteRow) -> StorageResult<TopologyLink> {
        let status_text: String = row.try_get("status")?;

        Ok(TopologyLink {
            id: Some(row.try_get("id")?),
            source_id: row.try_get("source_id")?,
            target_id: row.try_get("target_id")?,
            source_port: row.try_get("source_port")?,
            target_port: row.try_get("target_port")?,
            link_type: row.try_get("link_type")?,
            status: status_text.parse().map_err(StorageError::InvalidRow)?,
            updated_at: Self::millis_to_timestamp(row.try_get("updated_at")?),
        })
    }

    async fn find_device_where(
        &self,
        clause: &str,
        value: String,
    ) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE {clause} LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::device_from_row).transpose()
    }
}

#[async_trait]
impl MetricStore for SqliteBackend {
    #[instrument(skip(self, sample), fields(device_id = sample.device_id))]
    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO metrics (
                device_id, collector_id, timestamp, status,
                cpu_usage, memory_usage, disk_usage, latency, packet_loss
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.device_id)
        .bind(&sample.collector_id)
        .bind(Self::timestamp_to_millis(&sample.timestamp))
        .bind(sample.status.as_str())
        .bind(sample.cpu_usage)
        .bind(sample.memory_usage)
        .bind(sample.disk_usage)
        .bind(sample.latency)
        .bind(sample.packet_loss)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self, samples), fields(count = samples.len()))]
    async fn insert_interface_samples(&self, samples: &[InterfaceSample]) -> StorageResult<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for sample in samples {
            sqlx::query(
                r#"
                INSERT INTO interface_metrics (
                    device_id, if_index, if_name, timestamp, in_octets, out_octets
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(sample.device_id)
            .bind(i64::from(sample.if_index))
            .bind(&sample.if_name)
            .bind(Self::timestamp_to_millis(&sample.timestamp))
            // counters are stored bit-for-bit in the signed column
            .bind(sample.in_octets.map(|v| v as i64))
            .bind(sample.out_octets.map(|v| v as i64))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(device_id = query.device_id))]
    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<MetricSample>> {
        let limit_clause = query
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let sql = format!(
            r#"
            SELECT {METRIC_COLUMNS}
            FROM metrics
            WHERE device_id = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC, id ASC
            {limit_clause}
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(query.device_id)
            .bind(Self::timestamp_to_millis(&query.start))
            .bind(Self::timestamp_to_millis(&query.end))
            .fetch_all(&self.pool)
            .await?;

        let results = rows
            .iter()
            .map(Self::metric_from_row)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("query returned {} metrics", results.len());
        Ok(results)
    }

    #[instrument(skip(self), fields(since = %since))]
    async fn query_latest_per_device(
        &self,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<DeviceMetrics>> {
        let rows = sqlx::query(
            r#"
            SELECT m.device_id, m.collector_id, m.timestamp, m.status, m.cpu_usage,
                   m.memory_usage, m.disk_usage, m.latency, m.packet_loss,
                   d.name AS device_name, d.status AS device_status
            FROM (
                SELECT *,
                       ROW_NUMBER() OVER (
                           PARTITION BY device_id ORDER BY timestamp DESC, id DESC
                       ) AS rn
                FROM metrics
                WHERE timestamp >= ?
            ) m
            LEFT JOIN devices d ON d.id = m.device_id
            WHERE m.rn = 1
            ORDER BY m.device_id
            "#,
        )
        .bind(Self::timestamp_to_millis(&since))
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let sample = Self::metric_from_row(row)?;
            let device_status = row
                .try_get::<Option<String>, _>("device_status")?
                .and_then(|s| s.parse::<DeviceStatus>().ok());

            results.push(DeviceMetrics {
                sample,
                device_name: row.try_get("device_name")?,
                device_status,
            });
        }

        debug!("{} devices with fresh samples", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn query_interface_range(
        &self,
        device_id: DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<InterfaceSample>> {
        let rows = sqlx::query(
            r#"
            SELECT device_id, if_index, if_name, timestamp, in_octets, out_octets
            FROM interface_metrics
            WHERE device_id = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC, if_index ASC
            "#,
        )
        .bind(device_id)
        .bind(Self::timestamp_to_millis(&start))
        .bind(Self::timestamp_to_millis(&end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(InterfaceSample {
                    device_id: row.try_get("device_id")?,
                    if_index: row.try_get::<i64, _>("if_index")? as u32,
                    if_name: row.try_get("if_name")?,
                    timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
                    in_octets: row.try_get::<Option<i64>, _>("in_octets")?.map(|v| v as u64),
                    out_octets: row
                        .try_get::<Option<i64>, _>("out_octets")?
                        .map(|v| v as u64),
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_metrics(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let before_millis = Self::timestamp_to_millis(&before);

        info!("cleaning up metrics older than {}", before);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM metrics WHERE timestamp < ?")
            .bind(before_millis)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM interface_metrics WHERE timestamp < ?")
            .bind(before_millis)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = result.rows_affected() as usize;
        info!("deleted {} old metrics", deleted);

        Ok(deleted)
    }
}

#[async_trait]
impl DeviceInventory for SqliteBackend {
    #[instrument(skip(self))]
    async fn list_snmp_devices(&self) -> StorageResult<Vec<Device>> {
        let sql =
            format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE snmp_enabled = 1 ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::device_from_row).collect()
    }

    async fn find_device(&self, id: DeviceId) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::device_from_row).transpose()
    }

    async fn find_device_by_ip(&self, ip: IpAddr) -> StorageResult<Option<Device>> {
        self.find_device_where("management_ip = ?", ip.to_string())
            .await
    }

    async fn find_device_by_name(&self, name: &str) -> StorageResult<Option<Device>> {
        self.find_device_where("name = ?", name.to_string()).await
    }
}

#[async_trait]
impl InventoryAdmin for SqliteBackend {
    #[instrument(skip(self, seed), fields(name = %seed.name))]
    async fn upsert_device(&self, seed: &DeviceSeed) -> StorageResult<DeviceId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO devices (name, management_ip, snmp_enabled, snmp_community, snmp_version)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                management_ip = excluded.management_ip,
                snmp_enabled = excluded.snmp_enabled,
                snmp_community = excluded.snmp_community,
                snmp_version = excluded.snmp_version
            RETURNING id
            "#,
        )
        .bind(&seed.name)
        .bind(seed.management_ip.to_string())
        .bind(seed.snmp_enabled)
        .bind(&seed.snmp_community)
        .bind(seed.snmp_version.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    #[instrument(skip(self, seed), fields(name = %seed.name))]
    async fn upsert_rule(&self, seed: &RuleSeed) -> StorageResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO alert_rules (name, conditions, severity, enabled)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                conditions = excluded.conditions,
                severity = excluded.severity,
                enabled = excluded.enabled
            RETURNING id
            "#,
        )
        .bind(&seed.name)
        .bind(seed.conditions.to_string())
        .bind(&seed.severity)
        .bind(seed.enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl RuleRepository for SqliteBackend {
    #[instrument(skip(self))]
    async fn load_enabled_rules(&self) -> StorageResult<Vec<RuleRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, conditions, severity, enabled FROM alert_rules \
             WHERE enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RuleRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    conditions: row.try_get("conditions")?,
                    severity: row.try_get("severity")?,
                    enabled: row.try_get("enabled")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AlertSink for SqliteBackend {
    #[instrument(skip(self, alert), fields(device_id = alert.device_id, rule = %alert.rule_name))]
    async fn insert_alert(&self, alert: &AlertEvent) -> StorageResult<i64> {
        let details = serde_json::to_string(&alert.details)?;

        let result = sqlx::query(
            r#"
            INSERT INTO alerts (
                rule_id, rule_name, device_id, severity, status, message, details, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.rule_id)
        .bind(&alert.rule_name)
        .bind(alert.device_id)
        .bind(&alert.severity)
        .bind(alert.status.as_str())
        .bind(&alert.message)
        .bind(details)
        .bind(Self::timestamp_to_millis(&alert.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn query_recent_alerts(&self, limit: usize) -> StorageResult<Vec<AlertEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, rule_id, rule_name, device_id, severity, status, message, details, created_at
            FROM alerts
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::alert_from_row).collect()
    }
}

#[async_trait]
impl LogStore for SqliteBackend {
    async fn insert_syslog(&self, record: &SyslogRecord) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO syslog_messages (hostname, facility, severity, message, raw, received_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.hostname)
        .bind(i64::from(record.facility))
        .bind(i64::from(record.severity))
        .bind(&record.message)
        .bind(&record.raw)
        .bind(Self::timestamp_to_millis(&record.received_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn query_recent_syslog(&self, limit: usize) -> StorageResult<Vec<SyslogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, hostname, facility, severity, message, raw, received_at
            FROM syslog_messages
            ORDER BY received_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SyslogRecord {
                    id: Some(row.try_get("id")?),
                    hostname: row.try_get("hostname")?,
                    facility: row.try_get::<i64, _>("facility")? as u8,
                    severity: row.try_get::<i64, _>("severity")? as u8,
                    message: row.try_get("message")?,
                    raw: row.try_get("raw")?,
                    received_at: Self::millis_to_timestamp(row.try_get("received_at")?),
                })
            })
            .collect()
    }
}

#[async_trait]
impl TopologyStore for SqliteBackend {
    #[instrument(skip(self, link), fields(source = link.source_id, target = link.target_id, port = %link.source_port))]
    async fn upsert_link(&self, link: &TopologyLink) -> StorageResult<UpsertOutcome> {
        let updated_at = Self::timestamp_to_millis(&link.updated_at);

        // start with a write so the transaction holds the write lock from the outset
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO topology_links (
                source_id, target_id, source_port, target_port, link_type, status, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (source_id, target_id, source_port) DO NOTHING
            "#,
        )
        .bind(link.source_id)
        .bind(link.target_id)
        .bind(&link.source_port)
        .bind(&link.target_port)
        .bind(&link.link_type)
        .bind(link.status.as_str())
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        let outcome = if inserted.rows_affected() == 1 {
            UpsertOutcome::Created
        } else {
            sqlx::query(
                r#"
                UPDATE topology_links
                SET target_port = ?, status = ?, updated_at = ?
                WHERE source_id = ? AND target_id = ? AND source_port = ?
                "#,
            )
            .bind(&link.target_port)
            .bind(link.status.as_str())
            .bind(updated_at)
            .bind(link.source_id)
            .bind(link.target_id)
            .bind(&link.source_port)
            .execute(&mut *tx)
            .await?;

            UpsertOutcome::Updated
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn list_links(&self) -> StorageResult<Vec<TopologyLink>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_id, target_id, source_port, target_port, link_type, status, updated_at
            FROM topology_links
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::link_from_row).collect()
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{AlertStatus, LinkStatus};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    async fn open() -> (tempfile::TempDir, SqliteBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let backend = SqliteBackend::new(&db_path).await.unwrap();
        (temp_dir, backend)
    }

    fn seed(name: &str, ip: &str) -> DeviceSeed {
        DeviceSeed {
            name: name.to_string(),
            management_ip: ip.parse().unwrap(),
            snmp_enabled: true,
            snmp_community: Some("public".to_string()),
            snmp_version: crate::SnmpVersion::V2c,
        }
    }

    fn sample(device_id: DeviceId, at: DateTime<Utc>, cpu: f64) -> MetricSample {
        let mut sample = MetricSample::new(device_id, DeviceStatus::Online, at);
        sample.cpu_usage = Some(cpu);
        sample
    }

    #[tokio::test]
    async fn test_insert_and_query_range() {
        let (_dir, backend) = open().await;
        let base = Utc::now() - Duration::minutes(10);

        for i in 0..10 {
            backend
                .insert_metric(&sample(1, base + Duration::minutes(i), i as f64))
                .await
                .unwrap();
        }

        let results = backend
            .query_range(QueryRange {
                device_id: 1,
                start: base + Duration::minutes(2),
                end: base + Duration::minutes(8),
                limit: None,
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(results[0].cpu_usage, Some(2.0));
        // absent fields round-trip as absent
        assert_eq!(results[0].memory_usage, None);
    }

    #[tokio::test]
    async fn test_latest_per_device_joins_inventory() {
        let (_dir, backend) = open().await;
        let d1 = backend.upsert_device(&seed("D1", "10.0.0.1")).await.unwrap();
        let now = Utc::now();

        backend
            .insert_metric(&sample(d1, now - Duration::seconds(30), 40.0))
            .await
            .unwrap();
        backend
            .insert_metric(&sample(d1, now - Duration::seconds(10), 92.0))
            .await
            .unwrap();
        // device 999 is not in the inventory
        backend
            .insert_metric(&sample(999, now - Duration::seconds(5), 10.0))
            .await
            .unwrap();
        // stale sample of another device
        backend
            .insert_metric(&sample(d1 + 1, now - Duration::minutes(30), 10.0))
            .await
            .unwrap();

        let latest = backend
            .query_latest_per_device(now - Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].sample.device_id, d1);
        assert_eq!(latest[0].sample.cpu_usage, Some(92.0));
        assert_eq!(latest[0].device_name.as_deref(), Some("D1"));
        assert_eq!(latest[0].device_status, Some(DeviceStatus::Online));
        assert_eq!(latest[1].device_name, None);
    }

    #[tokio::test]
    async fn test_cleanup_old_metrics() {
        let (_dir, backend) = open().await;
        let now = Utc::now();

        backend
            .insert_metric(&sample(1, now - Duration::days(10), 1.0))
            .await
            .unwrap();
        backend.insert_metric(&sample(1, now, 2.0)).await.unwrap();

        let deleted = backend
            .cleanup_old_metrics(now - Duration::days(5))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = backend
            .query_range(QueryRange {
                device_id: 1,
                start: now - Duration::days(30),
                end: now,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_interface_samples() {
        let (_dir, backend) = open().await;
        let now = Utc::now();

        let samples = vec![
            InterfaceSample {
                device_id: 4,
                if_index: 1,
                if_name: Some("Gi0/1".to_string()),
                timestamp: now,
                in_octets: Some(u64::MAX - 1),
                out_octets: Some(42),
            },
            InterfaceSample {
                device_id: 4,
                if_index: 2,
                if_name: None,
                timestamp: now,
                in_octets: None,
                out_octets: None,
            },
        ];
        backend.insert_interface_samples(&samples).await.unwrap();

        let stored = backend
            .query_interface_range(4, now - Duration::seconds(1), now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].in_octets, Some(u64::MAX - 1));
        assert_eq!(stored[1].if_name, None);
    }

    #[tokio::test]
    async fn test_inventory_lookup() {
        let (_dir, backend) = open().await;
        let id = backend.upsert_device(&seed("core", "10.0.0.1")).await.unwrap();
        let mut quiet = seed("quiet", "10.0.0.2");
        quiet.snmp_enabled = false;
        backend.upsert_device(&quiet).await.unwrap();

        // re-seeding by name keeps the id
        let again = backend.upsert_device(&seed("core", "10.0.0.9")).await.unwrap();
        assert_eq!(again, id);

        let snmp = backend.list_snmp_devices().await.unwrap();
        assert_eq!(snmp.len(), 1);
        assert_eq!(snmp[0].management_ip, "10.0.0.9".parse::<IpAddr>().unwrap());

        let by_ip = backend
            .find_device_by_ip("10.0.0.2".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(by_ip.map(|d| d.name), Some("quiet".to_string()));
        assert!(backend.find_device_by_name("missing").await.unwrap().is_none());

        let by_id = backend.find_device(id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "core");
        assert!(backend.find_device(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_enabled_rules_only() {
        let (_dir, backend) = open().await;

        backend
            .upsert_rule(&RuleSeed {
                name: "on".to_string(),
                conditions: serde_json::json!({"metric": "latency", "threshold": 50}),
                severity: "critical".to_string(),
                enabled: true,
            })
            .await
            .unwrap();
        backend
            .upsert_rule(&RuleSeed {
                name: "off".to_string(),
                conditions: serde_json::json!({}),
                severity: "info".to_string(),
                enabled: false,
            })
            .await
            .unwrap();

        let rules = backend.load_enabled_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "on");
        assert!(rules[0].conditions.contains("latency"));
    }

    #[tokio::test]
    async fn test_alert_round_trip() {
        let (_dir, backend) = open().await;

        let alert = AlertEvent {
            id: None,
            rule_id: Some(3),
            rule_name: "CPU warning".to_string(),
            device_id: 1,
            severity: "warning".to_string(),
            status: AlertStatus::Pending,
            message: "D1 CPU usage is 92.0%, threshold > 80%".to_string(),
            details: serde_json::json!({"value": 92.0}),
            created_at: Utc::now(),
        };
        let id = backend.insert_alert(&alert).await.unwrap();

        let stored = backend.query_recent_alerts(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, Some(id));
        assert_eq!(stored[0].details["value"], 92.0);
    }

    #[tokio::test]
    async fn test_upsert_link_is_idempotent() {
        let (_dir, backend) = open().await;
        let t0 = Utc::now() - Duration::minutes(1);

        let mut link = TopologyLink {
            id: None,
            source_id: 1,
            target_id: 2,
            source_port: "Gi0/1".to_string(),
            target_port: "Gi0/24".to_string(),
            link_type: "ethernet".to_string(),
            status: LinkStatus::Up,
            updated_at: t0,
        };

        assert_eq!(backend.upsert_link(&link).await.unwrap(), UpsertOutcome::Created);

        link.target_port = "Gi0/23".to_string();
        link.link_type = "fiber".to_string();
        link.updated_at = t0 + Duration::seconds(30);
        assert_eq!(backend.upsert_link(&link).await.unwrap(), UpsertOutcome::Updated);

        let links = backend.list_links().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_port, "Gi0/23");
        // link type is only set on insert
        assert_eq!(links[0].link_type, "ethernet");
        assert!(links[0].updated_at > t0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, backend) = open().await;

        let health = backend.health_check().await.unwrap();
        assert!(health.healthy);
        assert!(health.message.contains("operational"));
    }
}
