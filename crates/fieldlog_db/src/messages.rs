//! Device message operations (append-only history).

use crate::error::Result;
use crate::types::{DeviceMessage, MessageClass, MessagePage};
use crate::FieldlogDb;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, warn};

/// Page size used when the caller asks for something out of range.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest page a caller may request. Bigger requests are capped here.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Page size used when a caller asks for zero rows.
pub const MIN_FALLBACK_PAGE_LIMIT: u32 = 10;

/// Rows per INSERT statement. 12 binds per row keeps each statement under
/// SQLite's historical limit of 999 bound parameters.
const INSERT_CHUNK_ROWS: usize = 80;

const MESSAGE_COLUMNS: &str = "number, mqtt, invid, unit_guid, message_id, message_text, context, message_class, level, area, address";

impl FieldlogDb {
    /// Append a batch of messages in one transaction.
    ///
    /// Every row of the batch gets the same `created_at`. Empty input is a no-op.
    pub async fn save_messages(&self, messages: &[DeviceMessage]) -> Result<()> {
        if messages.is_empty() {
            warn!("No messages to save");
            return Ok(());
        }

        let now = Self::now_millis();
        let mut tx = self.pool.begin().await?;

        for chunk in messages.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO device_messages ({}, created_at) ",
                MESSAGE_COLUMNS
            ));
            builder.push_values(chunk, |mut row, msg| {
                row.push_bind(msg.number)
                    .push_bind(msg.mqtt.as_str())
                    .push_bind(msg.invid.as_str())
                    .push_bind(msg.unit_guid.as_str())
                    .push_bind(msg.message_id.as_str())
                    .push_bind(msg.message_text.as_str())
                    .push_bind(msg.context.as_str())
                    .push_bind(msg.message_class.as_str())
                    .push_bind(msg.level)
                    .push_bind(msg.area.as_str())
                    .push_bind(msg.address.as_str())
                    .push_bind(now);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(saved = messages.len(), "Messages saved");
        Ok(())
    }

    /// Full history of one device, newest first.
    pub async fn messages_by_device(&self, unit_guid: &str) -> Result<Vec<DeviceMessage>> {
        let sql = format!(
            "SELECT {} FROM device_messages WHERE unit_guid = ? ORDER BY created_at DESC, id DESC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(unit_guid)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    /// Number of stored messages for one device.
    pub async fn count_messages_by_device(&self, unit_guid: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM device_messages WHERE unit_guid = ?")
            .bind(unit_guid)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// One page of a device's history, newest first.
    ///
    /// Pages start at 1; a page of 0 is treated as 1. A limit of 0 becomes
    /// [`MIN_FALLBACK_PAGE_LIMIT`] and anything above [`MAX_PAGE_LIMIT`] is
    /// capped to it.
    pub async fn messages_by_device_page(
        &self,
        unit_guid: &str,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage> {
        let page = page.max(1);
        let limit = match limit {
            0 => MIN_FALLBACK_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        };
        let offset = (page as i64 - 1) * limit as i64;

        let total = self.count_messages_by_device(unit_guid).await?;

        let sql = format!(
            "SELECT {} FROM device_messages WHERE unit_guid = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(unit_guid)
            .bind(limit as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(MessagePage {
            unit_guid: unit_guid.to_string(),
            messages: rows.iter().map(row_to_message).collect(),
            total,
            page,
            limit,
        })
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> DeviceMessage {
    let class: String = row.get("message_class");
    DeviceMessage {
        number: row.get("number"),
        mqtt: row.get("mqtt"),
        invid: row.get("invid"),
        unit_guid: row.get("unit_guid"),
        message_id: row.get("message_id"),
        message_text: row.get("message_text"),
        context: row.get("context"),
        message_class: MessageClass::parse(&class),
        level: row.get("level"),
        area: row.get("area"),
        address: row.get("address"),
    }
}
