use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("'{0}' is not a valid table name")]
    InvalidTableName(String),

    #[error("'{0}' is not a valid column name")]
    InvalidColumn(String),

    #[error("Malformed where clause: {0}")]
    InvalidWhereClause(String),

    #[error("Operator {0} is not supported")]
    UnsupportedOperator(String),

    #[error("Bad operand for operator: {0}")]
    InvalidOperatorData(String),

    #[error("Bad pagination bounds: {0}")]
    InvalidPagination(String),

    #[error("Write payload is empty")]
    EmptyPayload,
}
