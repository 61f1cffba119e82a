//! HTTP client for a ledger RPC gateway.

use crate::ledger::{LedgerError, LedgerRpc, TxId};
use crate::signer::InstructionSigner;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chaindrive_types::{Address, Instruction, ProgramError};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Ledger RPC client over HTTP.
#[derive(Clone, Debug)]
pub struct HttpLedgerClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpLedgerClient {
    /// Create a new client with the provided base URL
    /// (e.g. `http://localhost:8080/api/`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, LedgerError> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|_| LedgerError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base_url
            .join(path)
            .map_err(|_| LedgerError::InvalidBaseUrl(path.to_string()))
    }

    async fn map_api_error(response: Response) -> LedgerError {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        if let Ok(body) = serde_json::from_slice::<ApiErrorResponse>(&bytes) {
            if let Some(code) = body.code {
                if let Some(program_error) = ProgramError::from_code(code) {
                    return LedgerError::Program(program_error);
                }
            }
            if let Some(name) = body.name.as_deref() {
                if let Some(program_error) = ProgramError::from_name(name) {
                    return LedgerError::Program(program_error);
                }
                match name {
                    "AccountAlreadyExists" => return LedgerError::AccountAlreadyExists,
                    "AccountNotFound" => return LedgerError::AccountNotFound,
                    "Unauthorized" => return LedgerError::Unauthorized,
                    "StateConflict" => return LedgerError::StateConflict,
                    _ => {}
                }
            }
            return LedgerError::Rpc {
                status,
                message: body
                    .message
                    .unwrap_or_else(|| "request failed".to_string()),
            };
        }
        LedgerError::Rpc {
            status,
            message: String::from_utf8_lossy(&bytes).to_string(),
        }
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerClient {
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, LedgerError> {
        let url = self.endpoint(&format!("account/{address}"))?;
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.json::<AccountResponse>().await?;
                let data = BASE64.decode(&body.data).map_err(|err| LedgerError::Rpc {
                    status: status.as_u16(),
                    message: format!("invalid account data encoding: {err}"),
                })?;
                Ok(Some(data))
            }
            _ => Err(Self::map_api_error(response).await),
        }
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
    ) -> Result<Vec<(Address, Vec<u8>)>, LedgerError> {
        let url = self.endpoint(&format!("program/{program}/accounts"))?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        let status = response.status().as_u16();
        let body = response.json::<ProgramAccountsResponse>().await?;
        body.accounts
            .into_iter()
            .map(|entry| {
                let data = BASE64.decode(&entry.data).map_err(|err| LedgerError::Rpc {
                    status,
                    message: format!("invalid account data encoding: {err}"),
                })?;
                Ok((entry.address, data))
            })
            .collect()
    }

    async fn submit(
        &self,
        instruction: &Instruction,
        signer: &dyn InstructionSigner,
    ) -> Result<TxId, LedgerError> {
        let signature = signer.sign(&instruction.signing_payload());
        let request = SubmitRequest {
            program: instruction.program,
            accounts: instruction
                .accounts
                .iter()
                .map(|meta| AccountMetaDto {
                    address: meta.address,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: BASE64.encode(
                bincode::serialize(&instruction.data).expect("instruction data serializes"),
            ),
            signer: signer.address(),
            signature: BASE64.encode(signature),
        };

        let url = self.endpoint("tx/instruction")?;
        let response = self.http.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        let body = response.json::<SubmitResponse>().await?;
        Ok(body.tx_hash)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: Option<u32>,
    name: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct ProgramAccountsResponse {
    accounts: Vec<ProgramAccountEntry>,
}

#[derive(Debug, Deserialize)]
struct ProgramAccountEntry {
    address: Address,
    data: String,
}

#[derive(Debug, Serialize)]
struct AccountMetaDto {
    address: Address,
    is_signer: bool,
    is_writable: bool,
}

#[derive(Debug, Serialize)]
struct SubmitRequest {
    program: Address,
    accounts: Vec<AccountMetaDto>,
    data: String,
    signer: Address,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    tx_hash: String,
}
