//! Result of a gateway operation.
//!
//! Gateways never return `Err`. Every database failure is logged at the
//! boundary and handed back as [`Outcome::Failure`], distinct from
//! [`Outcome::NotFound`].

use crate::error::{DbError, DbResult};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation ran and produced data.
    Success(T),
    /// The operation ran and found nothing, or the procedure returned no cursor.
    NotFound,
    /// The operation could not be completed.
    Failure(DbError),
}

impl<T> Outcome<T> {
    /// Build an outcome from an inner lookup, where `Ok(None)` means absence.
    pub fn from_lookup(result: DbResult<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Success(value),
            Ok(None) => Self::NotFound,
            Err(err) => Self::Failure(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Collapse to the fail-soft view: data, or nothing.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::NotFound | Self::Failure(_) => None,
        }
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&DbError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::NotFound => Outcome::NotFound,
            Self::Failure(err) => Outcome::Failure(err),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::NotFound => "not_found",
            Self::Failure(_) => "failure",
        }
    }
}

impl<T> Outcome<Vec<T>> {
    /// Empty-to-absence normalization: an empty collection is `NotFound`.
    pub fn from_rows(result: DbResult<Option<Vec<T>>>) -> Self {
        Self::from_lookup(result.map(|rows| rows.filter(|r| !r.is_empty())))
    }
}

impl Outcome<bool> {
    /// `true` only for `Success(true)`.
    pub fn is_affirmative(&self) -> bool {
        matches!(self, Self::Success(true))
    }
}

/// Rendered as `{"status": ..., "data": ..., "error": ...}` for the CLI.
impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 3)?;
        state.serialize_field("status", self.status())?;
        match self {
            Self::Success(value) => {
                state.serialize_field("data", value)?;
                state.skip_field("error")?;
            }
            Self::NotFound => {
                state.skip_field("data")?;
                state.skip_field("error")?;
            }
            Self::Failure(err) => {
                state.skip_field("data")?;
                state.serialize_field("error", &err.to_string())?;
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rows_become_not_found() {
        let outcome: Outcome<Vec<i32>> = Outcome::from_rows(Ok(Some(Vec::new())));
        assert!(outcome.is_not_found());

        let outcome: Outcome<Vec<i32>> = Outcome::from_rows(Ok(None));
        assert!(outcome.is_not_found());

        let outcome = Outcome::from_rows(Ok(Some(vec![1, 2])));
        assert_eq!(outcome.into_option(), Some(vec![1, 2]));
    }

    #[test]
    fn test_failure_is_kept_distinct() {
        let outcome: Outcome<Vec<i32>> =
            Outcome::from_rows(Err(DbError::internal("connection reset")));
        assert!(outcome.is_failure());
        assert!(!outcome.is_not_found());
        assert!(outcome.failure().is_some());
        assert_eq!(outcome.into_option(), None);
    }

    #[test]
    fn test_affirmative() {
        assert!(Outcome::Success(true).is_affirmative());
        assert!(!Outcome::Success(false).is_affirmative());
        assert!(!Outcome::<bool>::NotFound.is_affirmative());
    }

    #[test]
    fn test_serialize_shape() {
        let json = serde_json::to_value(Outcome::Success("abc123")).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], "abc123");

        let json = serde_json::to_value(Outcome::<String>::NotFound).unwrap();
        assert_eq!(json["status"], "not_found");
        assert!(json.get("data").is_none());

        let json =
            serde_json::to_value(Outcome::<String>::Failure(DbError::invalid_input("bad"))).unwrap();
        assert_eq!(json["status"], "failure");
        assert!(json["error"].as_str().unwrap().contains("bad"));
    }
}
