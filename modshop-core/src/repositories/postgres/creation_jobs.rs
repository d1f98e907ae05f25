use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::debug;

use modshop_common::error::Error;
use modshop_common::models::{CreationJob, JobStatus, NewCreationJob};
use modshop_common::traits::repository_traits::CreationJobRepository;

/// Queue shared with the external account-creation worker. The worker moves
/// jobs to `processing` and then `completed`/`failed`; this side only
/// creates them and records the notification outcome.
#[derive(Clone)]
pub struct PostgresCreationJobRepository {
    pool: Pool<Postgres>,
}

impl PostgresCreationJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str =
    "job_id, user_id, email, password, mod_id, status, result_message, created_at, updated_at";

#[async_trait]
impl CreationJobRepository for PostgresCreationJobRepository {
    async fn create_job(&self, job: &NewCreationJob) -> Result<i32, Error> {
        let job_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO creation_jobs (user_id, email, password, mod_id, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING job_id
            "#,
        )
            .bind(&job.user_id)
            .bind(&job.email)
            .bind(&job.password)
            .bind(job.mod_id)
            .fetch_one(&self.pool)
            .await?;

        debug!("Queued creation job {} for user {}", job_id, job.user_id);
        Ok(job_id)
    }

    async fn list_recent_jobs(&self, limit: i64) -> Result<Vec<CreationJob>, Error> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM creation_jobs ORDER BY created_at DESC, job_id DESC LIMIT $1"
        );
        let jobs = sqlx::query_as::<_, CreationJob>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    async fn actionable_jobs(&self) -> Result<Vec<CreationJob>, Error> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM creation_jobs \
             WHERE status IN ('completed', 'failed') ORDER BY job_id"
        );
        let jobs = sqlx::query_as::<_, CreationJob>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    async fn update_job_status(&self, job_id: i32, status: JobStatus) -> Result<(), Error> {
        let res = sqlx::query(
            "UPDATE creation_jobs SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE job_id = $2",
        )
            .bind(status)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("creation job {job_id}")));
        }
        Ok(())
    }

    async fn stale_pending_jobs(&self, created_before: DateTime<Utc>) -> Result<Vec<i32>, Error> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT job_id FROM creation_jobs WHERE status = 'pending' AND created_at < $1 ORDER BY job_id",
        )
            .bind(created_before)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
