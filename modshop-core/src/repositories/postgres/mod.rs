pub mod accounts;
pub mod admins;
pub mod creation_jobs;
pub mod mods;
pub mod references;

pub use accounts::PostgresAccountRepository;
pub use admins::PostgresAdminRepository;
pub use creation_jobs::PostgresCreationJobRepository;
pub use mods::PostgresModRepository;
pub use references::PostgresReferenceRepository;

/// Postgres `unique_violation`.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
