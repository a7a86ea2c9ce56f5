//! Query requests and their outcomes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{json_type_name, Message};
use crate::CoreError;

/// Error code raised when an inbound message has no payload
pub const PAYLOAD_ERROR_CODE: &str = "postgres.errors.payload";

/// Parameters supplied with a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParameters {
    /// Values referenced by name from the SQL text
    Named(Map<String, Value>),
    /// Values bound in order to `$1..$n`
    Positional(Vec<Value>),
}

impl Default for QueryParameters {
    fn default() -> Self {
        QueryParameters::Named(Map::new())
    }
}

impl QueryParameters {
    /// Interpret the `queryParameters` property of a message
    ///
    /// Absent or `null` means no parameters.
    pub fn from_value(value: Option<&Value>) -> Result<Self, CoreError> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(map)) => Ok(QueryParameters::Named(map.clone())),
            Some(Value::Array(values)) => Ok(QueryParameters::Positional(values.clone())),
            Some(other) => Err(CoreError::ExecutionError(format!(
                "queryParameters must be an object or an array, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Whether no values were supplied
    pub fn is_empty(&self) -> bool {
        match self {
            QueryParameters::Named(map) => map.is_empty(),
            QueryParameters::Positional(values) => values.is_empty(),
        }
    }
}

/// One unit of work: a SQL statement plus its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Statement text
    pub sql_text: String,
    /// Bound parameters
    pub parameters: QueryParameters,
}

impl QueryRequest {
    /// Create a request without parameters
    pub fn new(sql_text: impl Into<String>) -> Self {
        Self {
            sql_text: sql_text.into(),
            parameters: QueryParameters::default(),
        }
    }

    /// Attach parameters
    pub fn with_parameters(mut self, parameters: QueryParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Build a request from an inbound message
    ///
    /// A missing payload is a [`CoreError::CallerError`]; a payload that is
    /// present but not a string, or malformed parameters, is an
    /// [`CoreError::ExecutionError`] reported as a normal failure.
    pub fn from_message(msg: &Message) -> Result<Self, CoreError> {
        let sql_text = match msg.payload() {
            None => return Err(CoreError::CallerError(PAYLOAD_ERROR_CODE.to_string())),
            Some(Value::String(sql)) => sql.clone(),
            Some(other) => {
                return Err(CoreError::ExecutionError(format!(
                    "query text must be a string, got {}",
                    json_type_name(other)
                )))
            }
        };
        let parameters = QueryParameters::from_value(msg.query_parameters())?;
        Ok(Self { sql_text, parameters })
    }
}

/// Terminal result of one dispatched request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The statement ran; rows are in result order
    Success {
        /// One JSON object per row, keyed by column name
        rows: Vec<Map<String, Value>>,
    },
    /// The statement could not be run or failed
    Failure {
        /// Underlying driver or configuration message
        message: String,
    },
}

impl Outcome {
    /// Build a failure from an error
    pub fn failure(err: &CoreError) -> Self {
        Outcome::Failure {
            message: err.to_string(),
        }
    }

    /// Whether this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
