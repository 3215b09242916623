use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::ObjectType;
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// Everything an action may need from the inbound request
#[derive(Clone)]
pub struct RequestContext {
    pub state: AppState,
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestContext {
    /// First value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a repeated query parameter
    pub fn params<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Boolean flag; present without value or `true`/`1`/`yes` is set
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.param(name).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("" | "true" | "1" | "yes")
        )
    }

    /// Numeric parameter; malformed values are rejected
    pub fn usize_param(&self, name: &str) -> Result<Option<usize>> {
        match self.param(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
                AppError::Validation(format!("Parameter '{}' must be a non-negative integer", name))
            }),
        }
    }

    /// The required `type` parameter, case-insensitive
    pub fn object_type(&self) -> Result<ObjectType> {
        let raw = self
            .param("type")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Validation("Parameter 'type' is required".to_string()))?;
        ObjectType::from_str(raw)
            .map_err(|_| AppError::Validation(format!("Unknown object type '{}'", raw)))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Check a shared-secret header; an unset secret denies every request
    pub fn require_token(&self, header: &str, expected: Option<&str>) -> Result<()> {
        let Some(expected) = expected.filter(|t| !t.is_empty()) else {
            return Err(AppError::Forbidden(format!("{} is not configured", header)));
        };
        let provided = self.header(header).unwrap_or_default();

        // Compare fixed-size digests so timing does not depend on the secret
        if Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes()) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Invalid {}", header)))
        }
    }

    /// Decode the JSON body; malformed payloads are not acceptable
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::NotAcceptable(format!("Malformed JSON body: {}", e)))
    }
}
