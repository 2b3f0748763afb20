//! Converts a decoded [`indexer_core::event::TypedEvent`] into the row shape
//! [`crate::events`] stores, and drives a single write or delete against
//! Postgres. Kept separate from [`crate::sink`] so the conversion and I/O are
//! each independently testable.

use {
    crate::{events, events::EventRow, metrics::Metrics, Address, Hash},
    indexer_core::event::TypedEvent,
    sqlx::PgPool,
    std::sync::Arc,
};

fn to_row(event: &TypedEvent) -> EventRow {
    EventRow {
        block_number: i64::try_from(event.block_number).unwrap_or(i64::MAX),
        block_hash: Hash(event.block_hash.0),
        block_timestamp: event.block_timestamp,
        transaction_hash: Hash(event.transaction_hash.0),
        transaction_index: i64::try_from(event.transaction_index).unwrap_or(i64::MAX),
        log_index: i64::try_from(event.log_index).unwrap_or(i64::MAX),
        contract_address: Address(event.address.into_array()),
        event_name: event.event_name.clone(),
        args: serde_json::to_value(&event.args).unwrap_or(serde_json::Value::Null),
    }
}

/// Apply one decoded event: an insert for a fresh occurrence, a block-scoped
/// delete for a retracted one.
pub async fn apply(pool: &PgPool, event: Arc<TypedEvent>) {
    let metrics = Metrics::get();
    let mut conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(err) => {
            metrics.write_errors.with_label_values(&[&event.chain]).inc();
            tracing::error!(chain = %event.chain, error = %err, "failed to acquire database connection");
            return;
        }
    };

    let contract = &event.contract.contract_name;
    let result = if event.removed {
        events::delete_at_block(
            &mut conn,
            &event.chain,
            contract,
            i64::try_from(event.block_number).unwrap_or(i64::MAX),
        )
        .await
        .map(|rows| {
            metrics
                .rows_deleted_reorg
                .with_label_values(&[&event.chain, contract])
                .inc_by(rows);
        })
    } else {
        let row = to_row(&event);
        events::insert_events(&mut conn, &event.chain, contract, std::slice::from_ref(&row))
            .await
            .map(|()| {
                metrics
                    .rows_inserted
                    .with_label_values(&[&event.chain, contract])
                    .inc();
            })
    };

    if let Err(err) = result {
        metrics.write_errors.with_label_values(&[&event.chain]).inc();
        tracing::error!(chain = %event.chain, contract, error = %err, "failed to apply event to database");
    }
}
