//! Conversions from external infrastructure errors into domain errors.

use chime_common::error::CommonError;
use chime_domain::ChimeError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ChimeError);

impl From<InfraError> for ChimeError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ChimeError> for InfraError {
    fn from(value: ChimeError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoChimeError {
    fn into_chime(self) -> ChimeError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ChimeError */
/* -------------------------------------------------------------------------- */

impl IntoChimeError for SqlError {
    fn into_chime(self) -> ChimeError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => ChimeError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        ChimeError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        ChimeError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        ChimeError::Database("foreign key constraint violation".into())
                    }
                    _ => ChimeError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => ChimeError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                ChimeError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ChimeError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => ChimeError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidParameterName(parameter_name) => {
                ChimeError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => {
                ChimeError::Database(format!("invalid database path: {}", path.to_string_lossy()))
            }
            RE::InvalidQuery => ChimeError::Database("invalid SQL query".into()),
            other => ChimeError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_chime())
    }
}

/* -------------------------------------------------------------------------- */
/* CommonError → ChimeError */
/* -------------------------------------------------------------------------- */

impl IntoChimeError for CommonError {
    fn into_chime(self) -> ChimeError {
        match self {
            CommonError::Crypto(msg) => ChimeError::Crypto(msg),
            CommonError::Storage(msg) => ChimeError::Database(msg),
        }
    }
}

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        InfraError(value.into_chime())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ChimeError */
/* -------------------------------------------------------------------------- */

impl IntoChimeError for HttpError {
    fn into_chime(self) -> ChimeError {
        if self.is_timeout() {
            return ChimeError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ChimeError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => ChimeError::Auth(message),
                404 => ChimeError::NotFound(message),
                429 => ChimeError::Network(message),
                400..=499 => ChimeError::InvalidInput(message),
                500..=599 => ChimeError::Network(message),
                _ => ChimeError::Network(message),
            };
        }

        ChimeError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_chime())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
