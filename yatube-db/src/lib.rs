pub mod client;
pub mod memory;
mod record;
pub mod store;

use thiserror::Error;
use yatube_common::model::ModelValidationError;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Unique constraint {0} was violated")]
    UniqueViolation(String),
    #[error("A referenced row does not exist: {0}")]
    MissingReference(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for DbError {
    fn from(value: sqlx::Error) -> Self {
        let Some(database_error) = value.as_database_error() else {
            return Self::Sqlx(value);
        };
        let constraint = database_error.constraint().unwrap_or_default().to_owned();

        if database_error.is_unique_violation() {
            Self::UniqueViolation(constraint)
        } else if database_error.is_foreign_key_violation() {
            Self::MissingReference(constraint)
        } else {
            Self::Sqlx(value)
        }
    }
}
