//! POST /add handler.
//!
//! Decodes two numeric-as-string operands, sums them in `f32` and answers
//! with the sum as a bare JSON number.

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

/// Error type for the add handler. Every variant answers 400.
#[derive(Debug, Error)]
pub enum AddError {
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("sum of {0} and {1} is not a finite number")]
    NonFiniteSum(f32, f32),
}

impl IntoResponse for AddError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "Rejected add request");
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        json_response(StatusCode::BAD_REQUEST, body)
    }
}

/// Request body of `POST /add`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operands {
    #[serde(deserialize_with = "lenient_f32")]
    pub operand_one: f32,
    #[serde(deserialize_with = "lenient_f32")]
    pub operand_two: f32,
}

impl Operands {
    pub fn sum(&self) -> f32 {
        self.operand_one + self.operand_two
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

/// Accept `"2.5"` as well as `2.5`; reject anything that is not finite.
fn lenient_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n as f32,
        NumberOrString::String(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| de::Error::custom(format!("{s:?} is not a number")))?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom("operand is not a finite f32"))
    }
}

/// Render a finite `f32` as a JSON number: `6`, not `6.0`.
///
/// `Display` yields the shortest digits that round-trip as `f32` and never
/// uses exponent notation, so the output is always valid JSON.
pub fn render_sum(sum: f32) -> String {
    if sum == 0.0 {
        // -0.0 as well
        return "0".to_string();
    }
    sum.to_string()
}

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

/// Handle `POST /add`.
///
/// The body is decoded regardless of its declared content type.
pub async fn add(body: Bytes) -> Result<Response, AddError> {
    let operands: Operands = serde_json::from_slice(&body)?;
    tracing::info!(
        operand_one = operands.operand_one,
        operand_two = operands.operand_two,
        "Adding operands"
    );

    let sum = operands.sum();
    if !sum.is_finite() {
        return Err(AddError::NonFiniteSum(
            operands.operand_one,
            operands.operand_two,
        ));
    }

    Ok(json_response(StatusCode::OK, render_sum(sum)))
}
