use thiserror::Error;

/// Rejected ingest input. Always caused by the client; never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty_body")]
    EmptyBody,

    #[error("invalid_json")]
    InvalidJson,

    #[error("empty_array")]
    EmptyArray,

    #[error("invalid_timestamp")]
    InvalidTimestamp,

    #[error("timestamp_required")]
    TimestampRequired,

    #[error("status_required")]
    StatusRequired,

    #[error("path_required")]
    PathRequired,

    #[error("method_required")]
    MethodRequired,

    #[error("result_id_required")]
    ResultIdRequired,
}

impl ValidationError {
    /// Record field that triggered the rejection, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::InvalidTimestamp | ValidationError::TimestampRequired => {
                Some("timestamp")
            }
            ValidationError::StatusRequired => Some("status"),
            ValidationError::PathRequired => Some("path"),
            ValidationError::MethodRequired => Some("method"),
            ValidationError::ResultIdRequired => Some("result.id"),
            _ => None,
        }
    }
}

/// Query parameter named in an `InvalidParameter` range error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeField {
    From,
    To,
    Limit,
    Skip,
}

impl RangeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeField::From => "from",
            RangeField::To => "to",
            RangeField::Limit => "limit",
            RangeField::Skip => "skip",
        }
    }
}

/// Rejected read window.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid_{}", .0.as_str())]
    InvalidParameter(RangeField),

    #[error("invalid_range")]
    InvalidRange,

    #[error("range_too_large")]
    RangeTooLarge,
}

/// Failure reported by the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint (`req_id` or `result.id`) was violated.
    #[error("duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("backend: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

/// Which kind of store call failed; selects the public error tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Insert,
    Query,
    Count,
}

/// Which uniqueness key a conflicting submission reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Log,
    Speedtest,
}

/// Unified error type returned by every core operation.
#[derive(Error, Debug)]
pub enum PulseError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("conflict: {kind:?}")]
    Conflict { kind: ConflictKind },

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("store {op:?} failed: {source}")]
    Store {
        op: StoreOp,
        #[source]
        source: StoreError,
    },
}

impl PulseError {
    pub fn store(op: StoreOp, source: StoreError) -> Self {
        PulseError::Store { op, source }
    }

    /// Map a failed insert, turning a uniqueness violation into a conflict.
    pub fn insert(kind: ConflictKind, source: StoreError) -> Self {
        if source.is_duplicate() {
            PulseError::Conflict { kind }
        } else {
            PulseError::Store {
                op: StoreOp::Insert,
                source,
            }
        }
    }

    /// Map to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            PulseError::Validation(_) | PulseError::Range(_) => 400,
            PulseError::Unauthorized(_) => 401,
            PulseError::Conflict { .. } => 409,
            PulseError::Store { .. } => 500,
        }
    }

    /// Stable machine-readable tag. Never carries store detail.
    pub fn tag(&self) -> String {
        match self {
            PulseError::Validation(e) => e.to_string(),
            PulseError::Range(e) => e.to_string(),
            PulseError::Conflict {
                kind: ConflictKind::Log,
            } => "duplicate_req_id".into(),
            PulseError::Conflict {
                kind: ConflictKind::Speedtest,
            } => "duplicate_result_id".into(),
            PulseError::Unauthorized(tag) => (*tag).into(),
            PulseError::Store { op, .. } => match op {
                StoreOp::Insert => "db_insert_failed".into(),
                StoreOp::Query => "db_query_failed".into(),
                StoreOp::Count => "db_count_failed".into(),
            },
        }
    }

    /// Field or parameter that triggered the error, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            PulseError::Validation(e) => e.field(),
            PulseError::Range(RangeError::InvalidParameter(f)) => Some(f.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_parameter_tags_name_the_field() {
        assert_eq!(RangeError::InvalidParameter(RangeField::From).to_string(), "invalid_from");
        assert_eq!(RangeError::InvalidParameter(RangeField::Skip).to_string(), "invalid_skip");
        assert_eq!(RangeError::RangeTooLarge.to_string(), "range_too_large");
    }

    #[test]
    fn duplicate_insert_becomes_conflict() {
        let err = PulseError::insert(
            ConflictKind::Log,
            StoreError::DuplicateKey { key: "abc".into() },
        );
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.tag(), "duplicate_req_id");
    }

    #[test]
    fn backend_insert_failure_hides_detail() {
        let err = PulseError::insert(
            ConflictKind::Speedtest,
            StoreError::Backend("mongodb://secret@host".into()),
        );
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.tag(), "db_insert_failed");
        assert!(err.field().is_none());
    }

    #[test]
    fn validation_error_reports_field() {
        let err = PulseError::from(ValidationError::PathRequired);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.tag(), "path_required");
        assert_eq!(err.field(), Some("path"));
    }
}
