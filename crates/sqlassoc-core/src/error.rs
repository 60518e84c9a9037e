//! Error types for association resolution and materialization.

use std::fmt;

/// The primary error type for all sqlassoc operations.
#[derive(Debug)]
pub enum Error {
    /// Registry and definition errors (duplicate, unknown, cyclic, invalid)
    Association(AssociationError),
    /// Join keys could not be inferred from the schema
    KeyInference(KeyInferenceError),
    /// A referenced relation has no schema descriptor (table absent)
    MissingSchema(MissingSchemaError),
    /// A schema descriptor is malformed
    Schema(SchemaError),
    /// A combine key matched more or fewer than one projected attribute
    CombineKey(CombineKeyError),
    /// The backend failed while executing a resolved plan
    Materialization(MaterializationError),
    /// Connection-related errors raised by a backend
    Connection(ConnectionError),
    /// Query execution errors raised by a backend
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct AssociationError {
    pub kind: AssociationErrorKind,
    /// Relation the association is declared on
    pub source_relation: String,
    /// Association name or target being looked up
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationErrorKind {
    /// An association with the same name is already registered on the source
    Duplicate,
    /// No association matches the requested name or target
    Unknown,
    /// A through-chain refers back to an association already being resolved
    Cyclic,
    /// The definition itself is malformed (e.g. many-to-many without `through`)
    Invalid,
}

#[derive(Debug, Clone)]
pub struct KeyInferenceError {
    pub kind: KeyInferenceErrorKind,
    /// Relation whose keys were inspected
    pub relation: String,
    /// Relation the keys should reference
    pub target: String,
    /// Candidate attributes that were found (empty for `NoCandidate`)
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInferenceErrorKind {
    /// No foreign key references the target
    NoCandidate,
    /// More than one foreign key references the target
    Ambiguous,
    /// The primary key has zero or several attributes
    CompositePrimaryKey,
}

#[derive(Debug, Clone)]
pub struct MissingSchemaError {
    /// The relation that has no schema descriptor
    pub relation: String,
}

#[derive(Debug, Clone)]
pub struct SchemaError {
    pub relation: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CombineKeyError {
    /// Child attribute the combine key should resolve to, qualified
    /// (`relation.attribute`) when another column of that name shadows it
    pub attribute: String,
    /// Number of projected attributes matching `attribute`
    pub candidates: usize,
}

#[derive(Debug)]
pub struct MaterializationError {
    /// Source relation of the plan being materialized
    pub relation: String,
    /// The statement that failed, when one was issued
    pub sql: Option<String>,
    pub source: Box<Error>,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Statement timeout
    Timeout,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl Error {
    /// Shorthand for a [`MissingSchemaError`].
    pub fn missing_schema(relation: impl Into<String>) -> Self {
        Error::MissingSchema(MissingSchemaError {
            relation: relation.into(),
        })
    }

    /// Shorthand for an [`AssociationError`].
    pub fn association(
        kind: AssociationErrorKind,
        source_relation: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Association(AssociationError {
            kind,
            source_relation: source_relation.into(),
            name: name.into(),
            message: message.into(),
        })
    }

    /// Is this a missing-schema error (a relation whose table does not exist yet)?
    ///
    /// The configuration layer tolerates these; everything else propagates.
    pub fn is_missing_schema(&self) -> bool {
        matches!(self, Error::MissingSchema(_))
    }

    /// Does this error signal a defect in association declarations rather
    /// than a runtime condition?
    pub fn is_defect(&self) -> bool {
        match self {
            Error::CombineKey(_) | Error::KeyInference(_) => true,
            Error::Association(a) => matches!(
                a.kind,
                AssociationErrorKind::Duplicate
                    | AssociationErrorKind::Cyclic
                    | AssociationErrorKind::Invalid
            ),
            _ => false,
        }
    }

    /// The association error kind, if this is an association error.
    pub fn association_kind(&self) -> Option<AssociationErrorKind> {
        match self {
            Error::Association(a) => Some(a.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::Materialization(m) => m.sql.as_deref().or_else(|| m.source.sql()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Association(e) => write!(f, "Association error: {}", e),
            Error::KeyInference(e) => write!(f, "Key inference error: {}", e),
            Error::MissingSchema(e) => write!(f, "Missing schema: {}", e),
            Error::Schema(e) => write!(f, "Schema error: {}", e),
            Error::CombineKey(e) => write!(f, "Ambiguous combine key: {}", e),
            Error::Materialization(e) => write!(f, "Materialization error: {}", e),
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Materialization(e) => Some(&*e.source),
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.source_relation, self.name, self.message)
    }
}

impl fmt::Display for KeyInferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            KeyInferenceErrorKind::NoCandidate => write!(
                f,
                "no foreign key on '{}' references '{}'",
                self.relation, self.target
            ),
            KeyInferenceErrorKind::Ambiguous => write!(
                f,
                "foreign keys on '{}' referencing '{}' are ambiguous: {}",
                self.relation,
                self.target,
                self.candidates.join(", ")
            ),
            KeyInferenceErrorKind::CompositePrimaryKey => write!(
                f,
                "'{}' has no single-attribute primary key (found [{}]); supply explicit keys",
                self.relation,
                self.candidates.join(", ")
            ),
        }
    }
}

impl fmt::Display for MissingSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no schema for relation '{}'", self.relation)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relation '{}': {}", self.relation, self.message)
    }
}

impl fmt::Display for CombineKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attribute '{}' matches {} projected attributes (expected exactly one)",
            self.attribute, self.candidates
        )
    }
}

impl fmt::Display for MaterializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loading '{}' failed: {}", self.relation, self.source)
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<AssociationError> for Error {
    fn from(err: AssociationError) -> Self {
        Error::Association(err)
    }
}

impl From<KeyInferenceError> for Error {
    fn from(err: KeyInferenceError) -> Self {
        Error::KeyInference(err)
    }
}

impl From<MissingSchemaError> for Error {
    fn from(err: MissingSchemaError) -> Self {
        Error::MissingSchema(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<CombineKeyError> for Error {
    fn from(err: CombineKeyError) -> Self {
        Error::CombineKey(err)
    }
}

impl From<MaterializationError> for Error {
    fn from(err: MaterializationError) -> Self {
        Error::Materialization(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for sqlassoc operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn missing_schema_is_tolerable_not_defect() {
        let err = Error::missing_schema("foos");
        assert!(err.is_missing_schema());
        assert!(!err.is_defect());
        assert_eq!(err.to_string(), "Missing schema: no schema for relation 'foos'");
    }

    #[test]
    fn defect_classification() {
        let ambiguous = Error::CombineKey(CombineKeyError {
            attribute: "task_id".to_string(),
            candidates: 2,
        });
        assert!(ambiguous.is_defect());

        let unknown = Error::association(
            AssociationErrorKind::Unknown,
            "tasks",
            "labels",
            "no such association",
        );
        assert!(!unknown.is_defect());
        assert_eq!(unknown.association_kind(), Some(AssociationErrorKind::Unknown));

        let cyclic = Error::association(AssociationErrorKind::Cyclic, "a", "b", "cycle");
        assert!(cyclic.is_defect());
    }

    #[test]
    fn key_inference_message_lists_candidates() {
        let err = Error::KeyInference(KeyInferenceError {
            kind: KeyInferenceErrorKind::Ambiguous,
            relation: "messages".to_string(),
            target: "users".to_string(),
            candidates: vec!["sender_id".to_string(), "recipient_id".to_string()],
        });
        let msg = err.to_string();
        assert!(msg.contains("sender_id, recipient_id"));
        assert!(msg.contains("'users'"));
    }

    #[test]
    fn materialization_wraps_backend_error() {
        let backend = Error::Query(QueryError {
            kind: QueryErrorKind::NotFound,
            sql: Some("SELECT 1".to_string()),
            sqlstate: Some("42P01".to_string()),
            message: "relation does not exist".to_string(),
            source: None,
        });
        let err = Error::Materialization(MaterializationError {
            relation: "tasks".to_string(),
            sql: None,
            source: Box::new(backend),
        });

        assert_eq!(err.sql(), Some("SELECT 1"));
        let source = err.source().expect("wrapped source");
        assert!(source.to_string().contains("42P01"));
    }
}
