use crate::value::{Map, Value};
use std::fmt;

/// Outcome category of an action, rendered as an HTTP-like status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    /// Missing or invalid parameter
    Invalid,
    NotFound,
    /// Not applicable to the object's current state
    Conflict,
    InternalError,
}

impl ResultCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            ResultCode::Ok => 200,
            ResultCode::Invalid => 403,
            ResultCode::NotFound => 404,
            ResultCode::Conflict => 409,
            ResultCode::InternalError => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Structured result returned by every action.
///
/// `code` and `status` always win over same-named additional fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionResult {
    code: ResultCode,
    status: String,
    additional: Map,
}

impl ActionResult {
    pub fn new(code: ResultCode, status: impl Into<String>) -> Self {
        Self {
            code,
            status: status.into(),
            additional: Map::new(),
        }
    }

    pub fn ok(status: impl Into<String>) -> Self {
        Self::new(ResultCode::Ok, status)
    }

    pub fn invalid(status: impl Into<String>) -> Self {
        Self::new(ResultCode::Invalid, status)
    }

    pub fn not_found(status: impl Into<String>) -> Self {
        Self::new(ResultCode::NotFound, status)
    }

    pub fn conflict(status: impl Into<String>) -> Self {
        Self::new(ResultCode::Conflict, status)
    }

    pub fn internal_error(status: impl Into<String>) -> Self {
        Self::new(ResultCode::InternalError, status)
    }

    /// Attach an additional field (e.g. a generated identifier).
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.additional.insert(key.to_string(), value.into());
        self
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.additional.get(key)
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.additional.clone();
        map.insert("code".to_string(), Value::from(self.code.as_u16()));
        map.insert("status".to_string(), Value::from(self.status.as_str()));
        Value::Map(map)
    }
}
