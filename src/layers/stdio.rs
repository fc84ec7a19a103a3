use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    sync::mpsc,
};
use tracing::{debug, error, warn};

use crate::{
    error::{AppError, AppResult},
    layers::hub::WalletHub,
    types::{
        EncodedSignatureOut, NoParams, ProviderRequestParams, SelectWalletParams, SendOut,
        SendRequest, SignEncodedParams, SignMessageParams, SignatureOut,
    },
};

/// Line-delimited JSON-RPC 2.0 bridge between a presentation layer and the hub.
#[derive(Clone)]
pub struct StdioServer {
    hub: WalletHub,
}

impl StdioServer {
    pub fn new(hub: WalletHub) -> Self {
        Self { hub }
    }

    /// Process requests until EOF on stdin.
    pub async fn run_stdio(self) -> AppResult<()> {
        let reader = BufReader::new(io::stdin());
        let writer = BufWriter::new(io::stdout());
        self.serve(reader, writer).await
    }

    /// Each request runs on its own task so a slow wallet call never holds
    /// up the lines behind it; responses are written as they complete and
    /// are matched to requests by `id`.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (responses_tx, mut responses) = mpsc::unbounded_channel::<RpcResponse>();
        let mut responses_tx = Some(responses_tx);
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line(), if responses_tx.is_some() => {
                    let Some(line) = line? else {
                        // EOF: let in-flight requests finish, then stop.
                        responses_tx = None;
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Some(tx) = &responses_tx {
                        self.spawn_request(line, tx.clone());
                    }
                }
                response = responses.recv() => {
                    let Some(response) = response else {
                        break;
                    };
                    let payload = serde_json::to_vec(&response).map_err(AppError::from)?;
                    writer.write_all(&payload).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
            }
        }

        Ok(())
    }

    fn spawn_request(&self, line: String, responses: mpsc::UnboundedSender<RpcResponse>) {
        let server = self.clone();
        tokio::spawn(async move {
            let response = match serde_json::from_str::<RpcRequest>(&line) {
                Ok(req) => server.handle_request(req).await,
                Err(err) => {
                    warn!("failed to parse JSON-RPC request: {err}");
                    RpcResponse::error(Value::Null, -32700, format!("parse error: {err}"))
                }
            };
            if responses.send(response).is_err() {
                debug!("response dropped, bridge already closed");
            }
        });
    }

    async fn handle_request(&self, req: RpcRequest) -> RpcResponse {
        let RpcRequest {
            method, params, id, ..
        } = req;

        match method.as_str() {
            "list_wallets" => {
                self.dispatch::<NoParams, _, _, _>(id, params, |hub, _| async move {
                    Ok::<_, AppError>(hub.list_wallets())
                })
                .await
            }
            "session" => {
                self.dispatch::<NoParams, _, _, _>(id, params, |hub, _| async move {
                    let session = hub.session();
                    Ok::<_, AppError>(json!({
                        "shortened_account_id": session.shortened_account_id(),
                        "session": session,
                        "environment": hub.environment(),
                    }))
                })
                .await
            }
            "select_wallet" => {
                self.dispatch::<SelectWalletParams, _, _, _>(id, params, |hub, parsed| async move {
                    hub.select_wallet(&parsed.name)
                })
                .await
            }
            "connect" => {
                self.dispatch::<NoParams, _, _, _>(id, params, |hub, _| async move {
                    hub.connect().await
                })
                .await
            }
            "disconnect" => {
                self.dispatch::<NoParams, _, _, _>(id, params, |hub, _| async move {
                    hub.disconnect().await.map(|_| json!({ "disconnected": true }))
                })
                .await
            }
            "sign_message" => {
                self.dispatch::<SignMessageParams, _, _, _>(id, params, |hub, parsed| async move {
                    let message = decode_hex(&parsed.message_hex)?;
                    let signature = hub.sign_message(&message).await?;
                    Ok::<_, AppError>(SignatureOut {
                        signature_hex: hex::encode(signature),
                    })
                })
                .await
            }
            "sign_message_encoded" => {
                self.dispatch::<SignEncodedParams, _, _, _>(id, params, |hub, parsed| async move {
                    let signature = hub.sign_message_encoded(&parsed.text).await?;
                    Ok::<_, AppError>(EncodedSignatureOut { signature })
                })
                .await
            }
            "send" => {
                self.dispatch::<SendRequest, _, _, _>(id, params, |hub, parsed| async move {
                    let signature_or_hash = hub.send(parsed).await?;
                    Ok::<_, AppError>(SendOut { signature_or_hash })
                })
                .await
            }
            "request" => {
                self.dispatch::<ProviderRequestParams, _, _, _>(id, params, |hub, req| async move {
                    hub.request(&req.method, req.params).await
                })
                .await
            }
            other => {
                warn!("received unknown method {other}");
                RpcResponse::error(id, -32601, format!("method not found: {other}"))
            }
        }
    }

    async fn dispatch<P, T, F, Fut>(
        &self,
        id: Value,
        params_value: Value,
        handler: F,
    ) -> RpcResponse
    where
        P: DeserializeOwned,
        T: Serialize,
        F: Fn(WalletHub, P) -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        match parse_params::<P>(params_value) {
            Ok(parsed) => match handler(self.hub.clone(), parsed).await {
                Ok(result) => match serde_json::to_value(result) {
                    Ok(value) => RpcResponse::success(id, value),
                    Err(err) => {
                        error!("serialization error: {err}");
                        RpcResponse::error(id, -32603, format!("serialization error: {err}"))
                    }
                },
                Err(err) => {
                    error!("handler error: {err}");
                    let payload = err.to_json_rpc();
                    RpcResponse::error_with_data(id, payload.code, payload.message, payload.data)
                }
            },
            Err(err) => {
                warn!("invalid params: {err}");
                RpcResponse::error(id, -32602, err.to_string())
            }
        }
    }
}

/// Absent params are read as an empty object.
fn parse_params<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    let value = if value.is_null() { json!({}) } else { value };
    serde_json::from_value(value)
        .map_err(|err| AppError::InvalidInput(format!("invalid params: {err}")))
}

fn decode_hex(raw: &str) -> AppResult<Vec<u8>> {
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|err| AppError::InvalidInput(format!("message_hex is not valid hex: {err}")))
}

fn default_null() -> Value {
    Value::Null
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default = "default_null")]
    params: Value,
    #[serde(default = "default_null")]
    id: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Value,
}

impl RpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        Self::error_with_data(id, code, message, json!({}))
    }

    fn error_with_data(id: Value, code: i32, message: String, data: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message,
                data,
            }),
            id,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
    data: Value,
}
