use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::info;

use modshop_common::error::Error;
use modshop_common::models::{Account, NewAccount};
use modshop_common::traits::repository_traits::AccountRepository;

/// Claimable inventory.
#[derive(Clone)]
pub struct PostgresAccountRepository {
    pool: Pool<Postgres>,
}

impl PostgresAccountRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn add_bulk_accounts(&self, mod_id: i32, accounts: &[NewAccount]) -> Result<u64, Error> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for acc in accounts {
            let res = sqlx::query(
                r#"
                INSERT INTO accounts (mod_id, username, password)
                VALUES ($1, $2, $3)
                "#,
            )
                .bind(mod_id)
                .bind(&acc.username)
                .bind(&acc.password)
                .execute(&mut *tx)
                .await?;
            added += res.rows_affected();
        }
        tx.commit().await?;

        info!("Added {} account(s) to mod {}", added, mod_id);
        Ok(added)
    }

    async fn get_available_account(&self, mod_id: i32) -> Result<Option<Account>, Error> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, mod_id, username, password, is_available
            FROM accounts
            WHERE mod_id = $1 AND is_available = TRUE
            ORDER BY id
            LIMIT 1
            "#,
        )
            .bind(mod_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn claim_account(&self, account_id: i32) -> Result<bool, Error> {
        let res = sqlx::query(
            "UPDATE accounts SET is_available = FALSE WHERE id = $1 AND is_available = TRUE",
        )
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}
