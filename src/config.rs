//! Configuração do cardflow carregada a partir de `cardflow.toml`.
//!
//! A struct [`CardflowConfig`] reúne o endereço do serviço, a credencial,
//! o quadro padrão, os nomes das colunas especiais e as preferências de
//! exibição. Campos ausentes usam defaults. As variáveis de ambiente
//! `CARDFLOW_URL`, `CARDFLOW_API_KEY` e `CARDFLOW_BOARD` têm precedência
//! sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::store::RoleNames;
use crate::view::ViewPrefs;

pub const CONFIG_FILE: &str = "cardflow.toml";

/// Configuração de nível superior carregada de `cardflow.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CardflowConfig {
    /// URL base da API de persistência.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token enviado como `Authorization: Bearer`.
    #[serde(default)]
    pub api_key: String,

    /// Quadro usado quando `--board` não é informado.
    #[serde(default)]
    pub board_id: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Nomes usados para reconhecer as colunas de escalonamento.
    #[serde(default)]
    pub roles: RoleNames,

    #[serde(default)]
    pub view: ViewPrefs,
}

// Valor padrão da URL: serviço local.
fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CardflowConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            board_id: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            roles: RoleNames::default(),
            view: ViewPrefs::default(),
        }
    }
}

impl CardflowConfig {
    /// Carrega `cardflow.toml` do diretório atual e aplica as variáveis de
    /// ambiente. Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Lê um arquivo específico, sem consultar o ambiente.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Sobrepõe campos com os valores devolvidos por `lookup`; valores
    /// vazios são ignorados.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("CARDFLOW_URL") {
            self.base_url = url;
        }
        if let Some(key) = get("CARDFLOW_API_KEY") {
            self.api_key = key;
        }
        if let Some(board) = get("CARDFLOW_BOARD") {
            self.board_id = Some(board);
        }
    }

    pub fn api_key(&self) -> Option<String> {
        Some(self.api_key.clone()).filter(|k| !k.is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
