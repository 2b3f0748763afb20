// https://github.com/rust-lang/rust-clippy/issues/9782
#![allow(clippy::needless_borrow)]

pub mod byte_array;
pub mod consumer;
pub mod events;
pub mod metrics;
pub mod migration;
pub mod retention;
pub mod sink;

use {
    byte_array::ByteArray,
    sqlx::{Executor, PgPool},
};

// Design:
//
// Functions that execute multiple statements should take `&mut PgTransaction`
// to indicate this and to ensure that the whole function succeeds or fails
// together. Functions that execute a single statement should take `&mut
// PgConnection`. We usually call the parameter `ex` for `Executor`, the trait
// whose methods we use to run queries. This scheme allows callers to decide
// whether they want to use the function as part of a bigger transaction or
// standalone. Note that PgTransaction implements Deref to PgConnection.
// Callers do need to take care of calling `commit` on the transaction.

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

pub type Address = ByteArray<20>;
pub type Hash = ByteArray<32>;

/// Every identifier we interpolate into SQL (schema and table names) is
/// chain/contract-derived and validated at config-load time, but we check
/// again here so a bug in that validation can't turn into SQL injection.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, thiserror::Error)]
#[error("identifier {0:?} is not a valid schema/table name component")]
pub struct InvalidIdentifier(pub String);

pub fn quote_identifier(value: &str) -> Result<String, InvalidIdentifier> {
    if is_valid_identifier(value) {
        Ok(format!("\"{value}\""))
    } else {
        Err(InvalidIdentifier(value.to_string()))
    }
}

/// Drop every schema named in `schemas`, including all of their tables. Only
/// used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>, schemas: &[&str]) -> sqlx::Result<()> {
    for schema in schemas {
        let quoted = quote_identifier(schema).map_err(|e| sqlx::Error::Configuration(e.into()))?;
        ex.execute(format!("DROP SCHEMA IF EXISTS {quoted} CASCADE;").as_str())
            .await?;
    }
    Ok(())
}

/// Like above but more ergonomic for tests that use a pool directly.
#[allow(non_snake_case)]
pub async fn clear_DANGER(pool: &PgPool, schemas: &[&str]) -> sqlx::Result<()> {
    let mut transaction = pool.begin().await?;
    clear_DANGER_(&mut transaction, schemas).await?;
    transaction.commit().await
}

#[cfg(test)]
mod tests {
    use {super::*, sqlx::Connection};

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("ethereum_mainnet"));
        assert!(is_valid_identifier("_leading_underscore"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("has-dash"));
        assert!(!is_valid_identifier("1starts_with_digit"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("semi;colon"));
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_clear() {
        let mut con = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut con = con.begin().await.unwrap();
        clear_DANGER_(&mut con, &["test_chain"]).await.unwrap();
    }
}
