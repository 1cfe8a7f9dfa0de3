//! Bitcoin Core Wallet RPC
//!
//! JSON-RPC 1.0 over HTTP with basic auth. bitcoind answers RPC-level errors
//! with a non-2xx status and a normal JSON body, so the body is parsed
//! regardless of status.

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{SignError, SignResult};
use crate::log_debug;
use crate::types::WifKey;

use super::signer::{RpcError, SigInput, SignResponse, WalletSigner};

const MODULE: &str = "coldsign::rpc";

/// Default bitcoind RPC endpoint
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8332";

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    code: i64,
    message: String,
}

/// Signer backed by a running bitcoind wallet
pub struct BitcoindRpc {
    client: Client,
    url: String,
    user: Option<String>,
    password: Option<SecretString>,
}

impl BitcoindRpc {
    pub fn new(url: impl Into<String>, user: Option<String>, password: Option<SecretString>) -> SignResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SignError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            user,
            password,
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        log_debug!(MODULE, format!("RPC {}", method));
        let mut request = self.client.post(&self.url).json(&request_body(method, params));
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref().map(|p| p.expose_secret().to_string()));
        }

        let response = request
            .send()
            .map_err(|e| RpcError::Transport(format!("{}: {}", self.url, e)))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        parse_reply(&body).map_err(|e| match e {
            RpcError::Malformed(_) if !status.is_success() => RpcError::Transport(format!("HTTP {}", status)),
            other => other,
        })
    }
}

fn request_body(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "1.0",
        "id": "coldsign",
        "method": method,
        "params": params,
    })
}

fn parse_reply<T: DeserializeOwned>(body: &str) -> Result<T, RpcError> {
    let reply: RpcReply = serde_json::from_str(body).map_err(|e| RpcError::Malformed(e.to_string()))?;
    if let Some(fault) = reply.error {
        return Err(RpcError::Rpc {
            code: fault.code,
            message: fault.message,
        });
    }
    serde_json::from_value(reply.result).map_err(|e| RpcError::Malformed(e.to_string()))
}

impl WalletSigner for BitcoindRpc {
    fn sign(&self, payload: &str, inputs: &[SigInput], keys: Option<&[WifKey]>) -> Result<SignResponse, RpcError> {
        match keys {
            Some(keys) => {
                let wifs: Vec<&str> = keys.iter().map(WifKey::as_str).collect();
                self.call("signrawtransactionwithkey", json!([payload, wifs, inputs]))
            }
            None => self.call("signrawtransactionwithwallet", json!([payload, inputs])),
        }
    }

    fn unlock(&self, passphrase: &SecretString, duration: Duration) -> Result<(), RpcError> {
        let _: Value = self.call(
            "walletpassphrase",
            json!([passphrase.expose_secret(), duration.as_secs()]),
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<(), RpcError> {
        let _: Value = self.call("walletlock", json!([]))?;
        Ok(())
    }
}
