//! Storage for decoded events in per-chain, per-contract tables created by
//! [`crate::migration`]. Unlike a fixed schema of known event types, the
//! column layout here is generic: every event's arguments are stored as a
//! single JSONB map, keyed by argument name, since the set of contracts and
//! their event shapes is only known at configuration time.

use {
    crate::{quote_identifier, Address, Hash},
    chrono::{DateTime, Utc},
    sqlx::{Executor, PgConnection},
};

/// One decoded event, shaped for storage. Produced from an
/// `indexer_core::event::TypedEvent` by the consumer, independent of that
/// type so this crate does not need to depend on the full pipeline machinery
/// to describe what a row looks like.
#[derive(Clone, Debug)]
pub struct EventRow {
    pub block_number: i64,
    pub block_hash: Hash,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: Hash,
    pub transaction_index: i64,
    pub log_index: i64,
    pub contract_address: Address,
    pub event_name: String,
    pub args: serde_json::Value,
}

fn events_table(chain: &str, contract: &str) -> Result<String, crate::InvalidIdentifier> {
    Ok(format!(
        "{}.{}",
        quote_identifier(chain)?,
        quote_identifier(&format!("{contract}_events"))?
    ))
}

/// Insert `rows` into `<chain>.<contract>_events`, ignoring rows whose
/// `(transaction_hash, log_index)` already exists so redelivery by an
/// at-least-once upstream is idempotent.
pub async fn insert_events(
    ex: &mut PgConnection,
    chain: &str,
    contract: &str,
    rows: &[EventRow],
) -> sqlx::Result<()> {
    let table = events_table(chain, contract).map_err(|e| sqlx::Error::Configuration(e.into()))?;
    let query = format!(
        "INSERT INTO {table} \
         (block_number, block_hash, block_timestamp, transaction_hash, transaction_index, \
          log_index, contract_address, event_name, args) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (transaction_hash, log_index) DO NOTHING;"
    );
    for row in rows {
        sqlx::query(&query)
            .bind(row.block_number)
            .bind(row.block_hash)
            .bind(row.block_timestamp)
            .bind(row.transaction_hash)
            .bind(row.transaction_index)
            .bind(row.log_index)
            .bind(row.contract_address)
            .bind(&row.event_name)
            .bind(&row.args)
            .execute(&mut *ex)
            .await?;
    }
    Ok(())
}

/// Delete every row at `block_number` in `<chain>.<contract>_events`. Used to
/// retract events when a single removed log is reported for a reorg: the
/// delete is scoped to one block, not a range, since only the blocks the node
/// actually retracted should lose their rows.
pub async fn delete_at_block(
    ex: &mut PgConnection,
    chain: &str,
    contract: &str,
    block_number: i64,
) -> sqlx::Result<u64> {
    let table = events_table(chain, contract).map_err(|e| sqlx::Error::Configuration(e.into()))?;
    let query = format!("DELETE FROM {table} WHERE block_number = $1;");
    let result = ex.execute(sqlx::query(&query).bind(block_number)).await?;
    Ok(result.rows_affected())
}

/// Delete every row in `<chain>.<contract>_events` older than `older_than`.
/// Used by the retention pruner, not by reorg handling.
pub async fn delete_older_than(
    ex: &mut PgConnection,
    chain: &str,
    contract: &str,
    older_than: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let table = events_table(chain, contract).map_err(|e| sqlx::Error::Configuration(e.into()))?;
    let query = format!("DELETE FROM {table} WHERE block_timestamp < $1;");
    let result = ex.execute(sqlx::query(&query).bind(older_than)).await?;
    Ok(result.rows_affected())
}
