use crate::error::{CoreError, RpcError};

/// One JSON-RPC call as queued by the client: method name and positional
/// parameters.
pub(super) type Call = (&'static str, Vec<serde_json::Value>);

/// A JSON-RPC 2.0 request. Used both standalone and as a batch element.
#[derive(serde::Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    pub(super) jsonrpc: &'static str,
    pub(super) id: u64,
    pub(super) method: &'a str,
    pub(super) params: &'a [serde_json::Value],
}

impl<'a> JsonRpcRequest<'a> {
    pub(super) fn new(id: u64, method: &'a str, params: &'a [serde_json::Value]) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponse {
    #[serde(default)]
    pub(super) id: serde_json::Value,
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    /// The call's result, or its error mapped to a `CoreError`. A missing
    /// `result` is treated as JSON `null`.
    pub(super) fn into_result(self) -> Result<serde_json::Value, CoreError> {
        match self.error {
            Some(err) if !err.is_null() => Err(parse_jsonrpc_error(err)),
            _ => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Map a JSON-RPC error object `{"code": <int>, "message": <string>}` to a
/// `ServerError`; anything else becomes `InvalidResponse` with the raw JSON.
pub(super) fn parse_jsonrpc_error(err: serde_json::Value) -> CoreError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) => RpcError::ServerError {
            code: parsed.code,
            message: parsed.message,
        }
        .into(),
        Err(_) => RpcError::InvalidResponse(format!("non-standard JSON-RPC error: {err}")).into(),
    }
}

/// Batch responses may echo the id as a number or a numeric string.
pub(super) fn parse_batch_id(id: &serde_json::Value) -> Result<u64, CoreError> {
    if let Some(n) = id.as_u64() {
        return Ok(n);
    }

    if let Some(s) = id.as_str() {
        return s.parse::<u64>().map_err(|e| {
            RpcError::InvalidResponse(format!("invalid batch response id string: {e}")).into()
        });
    }

    Err(RpcError::InvalidResponse(format!("invalid batch response id: {id}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_as_jsonrpc_2() {
        let params = [serde_json::json!("abc"), serde_json::json!(1)];
        let req = JsonRpcRequest::new(7, "getrawtransaction", &params);
        let value = serde_json::to_value(&req).expect("request must serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "getrawtransaction",
                "params": ["abc", 1]
            })
        );
    }

    #[test]
    fn null_error_field_is_not_an_error() {
        let resp: JsonRpcResponse =
            serde_json::from_value(serde_json::json!({"result": 5, "error": null, "id": 1}))
                .expect("response must decode");
        assert_eq!(resp.into_result().expect("ok"), serde_json::json!(5));
    }

    #[test]
    fn structured_error_becomes_server_error() {
        let resp: JsonRpcResponse = serde_json::from_value(serde_json::json!({
            "result": null,
            "error": {"code": -5, "message": "No such mempool or blockchain transaction"},
            "id": 1
        }))
        .expect("response must decode");
        assert!(matches!(
            resp.into_result(),
            Err(CoreError::Rpc(RpcError::ServerError { code: -5, .. }))
        ));
    }

    #[test]
    fn batch_ids_accept_numbers_and_numeric_strings() {
        assert_eq!(parse_batch_id(&serde_json::json!(42)).expect("number"), 42);
        assert_eq!(parse_batch_id(&serde_json::json!("123")).expect("string"), 123);
        assert!(parse_batch_id(&serde_json::json!(true)).is_err());
    }
}
