use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use modshop_common::error::Error;
use modshop_common::models::AdminRecord;
use modshop_common::traits::repository_traits::AdminRepository;

#[derive(Clone)]
pub struct PostgresAdminRepository {
    pool: Pool<Postgres>,
}

impl PostgresAdminRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminRepository for PostgresAdminRepository {
    async fn get_admin(&self, user_id: &str) -> Result<Option<AdminRecord>, Error> {
        let rec = sqlx::query_as::<_, AdminRecord>(
            "SELECT user_id, contact_number, is_online FROM admins WHERE user_id = $1",
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rec)
    }

    async fn list_admins(&self) -> Result<Vec<AdminRecord>, Error> {
        let recs = sqlx::query_as::<_, AdminRecord>(
            "SELECT user_id, contact_number, is_online FROM admins ORDER BY user_id",
        )
            .fetch_all(&self.pool)
            .await?;
        Ok(recs)
    }

    async fn upsert_admin(&self, user_id: &str, contact_number: Option<&str>) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO admins (user_id, contact_number)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET contact_number = COALESCE(EXCLUDED.contact_number, admins.contact_number)
            "#,
        )
            .bind(user_id)
            .bind(contact_number)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_online(&self, user_id: &str, is_online: bool) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO admins (user_id, is_online)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET is_online = EXCLUDED.is_online
            "#,
        )
            .bind(user_id)
            .bind(is_online)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
