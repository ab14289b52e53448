//! History row operations: record, lookup, list, prune.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::HistoryStore;
use super::types::{HistoryEntry, HistoryRecord};
use crate::resource::ResourceClass;

fn to_record(row: &SqliteRow) -> Result<HistoryRecord> {
    let class: String = row.get("class");
    let item_id: i64 = row.get("item_id");
    let file_id: Option<i64> = row.get("file_id");
    Ok(HistoryRecord {
        id: row.get("id"),
        credential: row.get("credential"),
        class: class
            .parse::<ResourceClass>()
            .with_context(|| format!("history row has unknown class {class:?}"))?,
        item_id: item_id as u64,
        file_id: file_id.map(|f| f as u64),
        url: row.get("url"),
        issued_at: row.get("issued_at"),
        name: row.get("name"),
    })
}

impl HistoryStore {
    /// Persist one issued link. Returns the row id.
    pub async fn record(&self, entry: &HistoryEntry) -> Result<i64> {
        let row_id = sqlx::query(
            r#"
            INSERT INTO download_history (
                credential, class, item_id, file_id, url, issued_at, name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.credential)
        .bind(entry.class.as_str())
        .bind(entry.item_id as i64)
        .bind(entry.file_id.map(|f| f as i64))
        .bind(&entry.url)
        .bind(entry.issued_at)
        .bind(entry.name.as_deref())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Most recent issuance for (credential, class, item, file).
    /// `file_id = None` matches only whole-item rows.
    pub async fn latest_for(
        &self,
        credential: &str,
        class: ResourceClass,
        item_id: u64,
        file_id: Option<u64>,
    ) -> Result<Option<HistoryRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, credential, class, item_id, file_id, url, issued_at, name
            FROM download_history
            WHERE credential = ?1
              AND class = ?2
              AND item_id = ?3
              AND file_id IS ?4
            ORDER BY issued_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(credential)
        .bind(class.as_str())
        .bind(item_id as i64)
        .bind(file_id.map(|f| f as i64))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(to_record).transpose()
    }

    /// Newest-first issuance history for one credential.
    pub async fn list_recent(&self, credential: &str, limit: u32) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, credential, class, item_id, file_id, url, issued_at, name
            FROM download_history
            WHERE credential = ?1
            ORDER BY issued_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(credential)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(to_record).collect()
    }

    /// Delete rows issued before `issued_before` (Unix ms). Returns how many were removed.
    pub async fn prune_older_than(&self, issued_before: i64) -> Result<u64> {
        let done = sqlx::query(
            r#"
            DELETE FROM download_history
            WHERE issued_at < ?1
            "#,
        )
        .bind(issued_before)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected())
    }

    /// Delete every row for one credential.
    pub async fn clear(&self, credential: &str) -> Result<u64> {
        let done = sqlx::query(
            r#"
            DELETE FROM download_history
            WHERE credential = ?1
            "#,
        )
        .bind(credential)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected())
    }
}
