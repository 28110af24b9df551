//! JSON-RPC call framing for the instrumentation endpoint.
//!
//! The endpoint exposes `ReadVariable`/`WriteVariable` methods whose
//! results carry a `{success, data, error}` payload; only that call
//! shape is modeled here.

use serde::{Deserialize, Serialize};

use crate::LinkError;

pub const METHOD_READ_VARIABLE: &str = "ReadVariable";
pub const METHOD_WRITE_VARIABLE: &str = "WriteVariable";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub result: Option<CallOutcome>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct CallOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    fn into_outcome(self) -> Result<CallOutcome, LinkError> {
        if let Some(error) = self.error {
            return Err(LinkError::Rejected(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }
        let outcome = self
            .result
            .ok_or_else(|| LinkError::Transport("reply carried neither result nor error".into()))?;
        if !outcome.success {
            return Err(LinkError::Rejected(
                outcome.error.unwrap_or_else(|| "call failed".into()),
            ));
        }
        Ok(outcome)
    }

    pub fn into_read_value(self) -> Result<i64, LinkError> {
        let outcome = self.into_outcome()?;
        outcome
            .data
            .as_ref()
            .and_then(value_as_i64)
            .ok_or_else(|| LinkError::Transport("read reply carried no integer value".into()))
    }

    pub fn into_write_ack(self) -> Result<(), LinkError> {
        self.into_outcome().map(|_| ())
    }
}

// The rig reports some variables as JSON numbers and some as decimal
// strings, so accept both.
fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> RpcResponse {
        serde_json::from_str(raw).expect("response")
    }

    #[test]
    fn request_serializes_with_positional_params() {
        let request = RpcRequest::new(
            7,
            METHOD_WRITE_VARIABLE,
            serde_json::json!(["CAN_DW.CAN_FanStatus", 2]),
        );
        let frame = serde_json::to_value(&request).expect("frame");
        assert_eq!(frame["jsonrpc"], "2.0");
        assert_eq!(frame["id"], 7);
        assert_eq!(frame["method"], "WriteVariable");
        assert_eq!(frame["params"][1], 2);
    }

    #[test]
    fn successful_read_yields_integer_value() {
        let response = parse(r#"{"id":1,"result":{"success":true,"data":2}}"#);
        assert_eq!(response.into_read_value().expect("value"), 2);
    }

    #[test]
    fn stringly_typed_values_are_accepted() {
        let response = parse(r#"{"id":1,"result":{"success":true,"data":"3"}}"#);
        assert_eq!(response.into_read_value().expect("value"), 3);
    }

    #[test]
    fn unsuccessful_result_is_a_rejection() {
        let response = parse(r#"{"id":1,"result":{"success":false,"error":"no such variable"}}"#);
        match response.into_read_value() {
            Err(LinkError::Rejected(message)) => assert_eq!(message, "no such variable"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn rpc_level_error_is_a_rejection() {
        let response = parse(r#"{"id":1,"error":{"code":-32601,"message":"unknown method"}}"#);
        match response.into_write_ack() {
            Err(LinkError::Rejected(message)) => assert!(message.contains("unknown method")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn reply_without_result_or_error_is_a_transport_fault() {
        let response = parse(r#"{"id":1}"#);
        assert!(matches!(
            response.into_write_ack(),
            Err(LinkError::Transport(_))
        ));
    }

    #[test]
    fn non_numeric_read_payload_is_a_transport_fault() {
        let response = parse(r#"{"id":1,"result":{"success":true,"data":[1]}}"#);
        assert!(matches!(
            response.into_read_value(),
            Err(LinkError::Transport(_))
        ));
    }
}
