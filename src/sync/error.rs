//! Erros do cliente de sincronização com o serviço de persistência.
//!
//! [`SyncError`] cobre as falhas de transporte que o gerenciador de
//! reconciliação trata como "a chamada remota falhou": respostas HTTP de
//! erro, timeouts e falhas de rede.

use thiserror::Error;

/// Falhas de uma chamada ao serviço remoto.
#[derive(Debug, Error)]
pub enum SyncError {
    /// O serviço respondeu com um status de erro (4xx/5xx).
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// O registro pedido não existe no serviço (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Chave de API ausente ou inválida (HTTP 401/403).
    #[error("unauthorized: API key missing or invalid")]
    Unauthorized,

    /// A requisição excedeu o timeout configurado.
    #[error("request timed out")]
    Timeout,

    /// O corpo da resposta não corresponde ao registro esperado.
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// Falha de rede (conexão recusada, DNS, TLS).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::Decode(err)
        } else {
            SyncError::Network(err)
        }
    }
}
