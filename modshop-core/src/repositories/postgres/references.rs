// File: modshop-core/src/repositories/postgres/references.rs

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info, warn};

use modshop_common::error::Error;
use modshop_common::models::{
    Account, ClaimGrant, ClaimOutcome, NewReference, RefNumber, Reference, ReferenceDetails,
};
use modshop_common::traits::repository_traits::ReferenceRepository;

/// The claims ledger. `ref_number` is the primary key, so at most one
/// registration exists per payment.
pub struct PostgresReferenceRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresReferenceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_details(r: &PgRow) -> Result<ReferenceDetails, Error> {
    Ok(ReferenceDetails {
        reference: Reference {
            ref_number: r.try_get("ref_number")?,
            user_id: r.try_get("user_id")?,
            mod_id: r.try_get("mod_id")?,
            timestamp: r.try_get("timestamp")?,
            claims_used: r.try_get("claims_used")?,
            claims_max: r.try_get("claims_max")?,
        },
        mod_name: r.try_get("mod_name")?,
    })
}

const INSERT_REFERENCE: &str = r#"
    INSERT INTO "references" (ref_number, user_id, mod_id, claims_max)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (ref_number) DO NOTHING
"#;

#[async_trait]
impl ReferenceRepository for PostgresReferenceRepository {
    async fn insert_reference(&self, reference: &NewReference) -> Result<(), Error> {
        let res = sqlx::query(INSERT_REFERENCE)
            .bind(reference.ref_number.as_str())
            .bind(&reference.user_id)
            .bind(reference.mod_id)
            .bind(reference.claims_max)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            warn!("Rejected duplicate reference {}", reference.ref_number);
            return Err(Error::DuplicateReference(reference.ref_number.to_string()));
        }
        info!(
            "Registered reference {} for mod {} ({} claims)",
            reference.ref_number, reference.mod_id, reference.claims_max
        );
        Ok(())
    }

    async fn insert_bulk_references(&self, references: &[NewReference]) -> Result<Vec<RefNumber>, Error> {
        let mut tx = self.pool.begin().await?;
        let mut duplicates = Vec::new();
        for reference in references {
            let res = sqlx::query(INSERT_REFERENCE)
                .bind(reference.ref_number.as_str())
                .bind(&reference.user_id)
                .bind(reference.mod_id)
                .bind(reference.claims_max)
                .execute(&mut *tx)
                .await?;
            if res.rows_affected() == 0 {
                duplicates.push(reference.ref_number.clone());
            }
        }
        tx.commit().await?;

        info!(
            "Bulk reference insert: {} added, {} duplicate(s)",
            references.len() - duplicates.len(),
            duplicates.len()
        );
        Ok(duplicates)
    }

    async fn get_reference(&self, ref_number: &RefNumber) -> Result<Option<ReferenceDetails>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT r.ref_number, r.user_id, r.mod_id, r.timestamp,
                   r.claims_used, r.claims_max, m.name AS mod_name
            FROM "references" r
            JOIN mods m ON r.mod_id = m.id
            WHERE r.ref_number = $1
            "#,
        )
            .bind(ref_number.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_details).transpose()
    }

    async fn list_references(&self) -> Result<Vec<ReferenceDetails>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT r.ref_number, r.user_id, r.mod_id, r.timestamp,
                   r.claims_used, r.claims_max, m.name AS mod_name
            FROM "references" r
            JOIN mods m ON r.mod_id = m.id
            ORDER BY r.timestamp DESC, r.ref_number
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_details).collect()
    }

    async fn use_claim(&self, ref_number: &RefNumber) -> Result<bool, Error> {
        let res = sqlx::query(
            r#"
            UPDATE "references"
            SET claims_used = claims_used + 1
            WHERE ref_number = $1 AND claims_used < claims_max
            "#,
        )
            .bind(ref_number.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn try_claim(&self, ref_number: &RefNumber) -> Result<ClaimOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the reference serialises concurrent claims against it.
        let row_opt = sqlx::query(
            r#"
            SELECT r.mod_id, r.claims_used, r.claims_max, m.name AS mod_name
            FROM "references" r
            JOIN mods m ON r.mod_id = m.id
            WHERE r.ref_number = $1
            FOR UPDATE OF r
            "#,
        )
            .bind(ref_number.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row_opt else {
            return Ok(ClaimOutcome::NotFound);
        };
        let mod_id: i32 = row.try_get("mod_id")?;
        let claims_used: i32 = row.try_get("claims_used")?;
        let claims_max: i32 = row.try_get("claims_max")?;
        let mod_name: String = row.try_get("mod_name")?;

        if claims_used >= claims_max {
            debug!("Reference {} exhausted ({}/{})", ref_number, claims_used, claims_max);
            return Ok(ClaimOutcome::Exhausted { claims_used, claims_max });
        }

        let account_opt = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, mod_id, username, password, is_available
            FROM accounts
            WHERE mod_id = $1 AND is_available = TRUE
            ORDER BY id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
            .bind(mod_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(mut account) = account_opt else {
            return Ok(ClaimOutcome::OutOfStock { mod_id });
        };

        sqlx::query("UPDATE accounts SET is_available = FALSE WHERE id = $1")
            .bind(account.id)
            .execute(&mut *tx)
            .await?;

        let new_used: i32 = sqlx::query_scalar(
            r#"
            UPDATE "references"
            SET claims_used = claims_used + 1
            WHERE ref_number = $1
            RETURNING claims_used
            "#,
        )
            .bind(ref_number.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        account.is_available = false;

        info!(
            "Reference {} claimed account {} (mod {}), {}/{} used",
            ref_number, account.id, mod_id, new_used, claims_max
        );
        Ok(ClaimOutcome::Granted(ClaimGrant {
            account,
            ref_number: ref_number.clone(),
            mod_id,
            mod_name,
            claims_used: new_used,
            claims_max,
        }))
    }

    async fn update_reference_mod(&self, ref_number: &RefNumber, mod_id: i32) -> Result<bool, Error> {
        let res = sqlx::query(r#"UPDATE "references" SET mod_id = $1 WHERE ref_number = $2"#)
            .bind(mod_id)
            .bind(ref_number.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_reference(&self, ref_number: &RefNumber) -> Result<u64, Error> {
        let res = sqlx::query(r#"DELETE FROM "references" WHERE ref_number = $1"#)
            .bind(ref_number.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
