//! Schema creation for dynamic, config-driven chain/contract tables. Each
//! chain gets its own Postgres schema; each contract on that chain gets an
//! events table. Creation is idempotent (`IF NOT EXISTS` throughout) so it
//! can run every time the daemon starts without special-casing a first run.

use {crate::quote_identifier, sqlx::Executor, sqlx::PgConnection};

pub async fn create_chain_schema(ex: &mut PgConnection, chain: &str) -> sqlx::Result<()> {
    let schema = quote_identifier(chain).map_err(|e| sqlx::Error::Configuration(e.into()))?;
    ex.execute(format!("CREATE SCHEMA IF NOT EXISTS {schema};").as_str())
        .await?;
    Ok(())
}

pub async fn create_contract_table(
    ex: &mut PgConnection,
    chain: &str,
    contract: &str,
) -> sqlx::Result<()> {
    let schema = quote_identifier(chain).map_err(|e| sqlx::Error::Configuration(e.into()))?;
    let table = quote_identifier(&format!("{contract}_events"))
        .map_err(|e| sqlx::Error::Configuration(e.into()))?;
    let query = format!(
        "CREATE TABLE IF NOT EXISTS {schema}.{table} ( \
            block_number BIGINT NOT NULL, \
            block_hash BYTEA NOT NULL, \
            block_timestamp TIMESTAMPTZ NOT NULL, \
            transaction_hash BYTEA NOT NULL, \
            transaction_index BIGINT NOT NULL, \
            log_index BIGINT NOT NULL, \
            contract_address BYTEA NOT NULL, \
            event_name TEXT NOT NULL, \
            args JSONB NOT NULL, \
            PRIMARY KEY (transaction_hash, log_index) \
        );"
    );
    ex.execute(query.as_str()).await?;
    let index = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {schema}.{table} (block_number);",
        quote_identifier(&format!("{contract}_events_block_number_idx"))
            .map_err(|e| sqlx::Error::Configuration(e.into()))?
    );
    ex.execute(index.as_str()).await?;
    Ok(())
}

/// Run every migration step needed for one chain's configured contracts, in a
/// single transaction so a partially created schema never becomes visible to
/// other connections.
pub async fn migrate_chain(
    transaction: &mut crate::PgTransaction<'_>,
    chain: &str,
    contracts: &[&str],
) -> sqlx::Result<()> {
    create_chain_schema(transaction, chain).await?;
    for contract in contracts {
        create_contract_table(transaction, chain, contract).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;

    #[tokio::test]
    #[ignore]
    async fn postgres_migration_is_idempotent() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut tx = db.begin().await.unwrap();
        migrate_chain(&mut tx, "test_chain", &["token", "vault"]).await.unwrap();
        migrate_chain(&mut tx, "test_chain", &["token", "vault"]).await.unwrap();
        crate::clear_DANGER_(&mut tx, &["test_chain"]).await.unwrap();
    }
}
