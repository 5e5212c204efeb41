//! Interface de linha de comando do cardflow baseada em clap.
//!
//! Cada subcomando vira uma intenção enviada ao [`Reconciler`](cardflow::reconcile::Reconciler).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use cardflow::engine::{Direction, Intent};
use cardflow::model::{CardPatch, Priority};

/// cardflow: quadro kanban com sincronização otimista.
#[derive(Debug, Parser)]
#[command(name = "cardflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quadro a usar (sobrepõe `board_id` da configuração).
    #[arg(long, global = true)]
    pub board: Option<String>,

    /// URL base da API (sobrepõe `base_url`).
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Caminho alternativo para o arquivo de configuração.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mostra o quadro.
    Show {
        /// Inclui cartões arquivados.
        #[arg(long)]
        archived: bool,
    },

    /// Move um cartão para outra coluna.
    Move {
        card: String,
        column: String,
        /// Posição de destino; sem ela o cartão vai para o fim.
        #[arg(long)]
        position: Option<u32>,
    },

    /// Envia um cartão para a fila de escalonamento.
    Escalate { card: String },

    /// Retira um cartão da fila de escalonamento.
    Deescalate { card: String },

    /// Converte uma cotação ganha em pedido.
    Win { card: String },

    /// Arquiva uma cotação perdida.
    Lose { card: String },

    /// Edita campos de um cartão.
    Edit {
        card: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// Responsável; string vazia remove.
        #[arg(long)]
        assignee: Option<String>,
        /// Prazo no formato AAAA-MM-DD; "none" remove.
        #[arg(long)]
        due: Option<String>,
    },

    /// Gerencia colunas.
    Column {
        #[command(subcommand)]
        action: ColumnAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ColumnAction {
    /// Move a coluna uma posição para a esquerda.
    Left { column: String },
    /// Move a coluna uma posição para a direita.
    Right { column: String },
    /// Adiciona uma coluna ao fim do quadro.
    Add {
        name: String,
        #[arg(long = "final")]
        is_final: bool,
    },
    Rename { column: String, name: String },
    Recolor { column: String, color: String },
    /// Remove uma coluna vazia.
    Delete { column: String },
}

impl Command {
    /// A intenção correspondente; `None` para comandos só de leitura.
    pub fn intent(&self) -> anyhow::Result<Option<Intent>> {
        let intent = match self {
            Command::Show { .. } => return Ok(None),
            Command::Move {
                card,
                column,
                position,
            } => Intent::Move {
                card: card.as_str().into(),
                column: column.as_str().into(),
                position: *position,
            },
            Command::Escalate { card } => Intent::Escalate {
                card: card.as_str().into(),
            },
            Command::Deescalate { card } => Intent::Deescalate {
                card: card.as_str().into(),
            },
            Command::Win { card } => Intent::Win {
                card: card.as_str().into(),
            },
            Command::Lose { card } => Intent::Lose {
                card: card.as_str().into(),
            },
            Command::Edit {
                card,
                title,
                priority,
                assignee,
                due,
            } => Intent::Edit {
                card: card.as_str().into(),
                patch: CardPatch {
                    title: title.clone(),
                    priority: priority.map(Priority::from),
                    assignee: assignee
                        .as_ref()
                        .map(|a| Some(a.clone()).filter(|a| !a.is_empty())),
                    due_date: due.as_deref().map(parse_due).transpose()?,
                },
            },
            Command::Column { action } => action.intent(),
        };
        Ok(Some(intent))
    }
}

impl ColumnAction {
    fn intent(&self) -> Intent {
        match self {
            ColumnAction::Left { column } => Intent::ReorderColumn {
                column: column.as_str().into(),
                direction: Direction::Left,
            },
            ColumnAction::Right { column } => Intent::ReorderColumn {
                column: column.as_str().into(),
                direction: Direction::Right,
            },
            ColumnAction::Add { name, is_final } => Intent::AddColumn {
                name: name.clone(),
                is_final: *is_final,
            },
            ColumnAction::Rename { column, name } => Intent::UpdateColumn {
                column: column.as_str().into(),
                name: Some(name.clone()),
                color: None,
            },
            ColumnAction::Recolor { column, color } => Intent::UpdateColumn {
                column: column.as_str().into(),
                name: None,
                color: Some(color.clone()),
            },
            ColumnAction::Delete { column } => Intent::DeleteColumn {
                column: column.as_str().into(),
            },
        }
    }
}

fn parse_due(value: &str) -> anyhow::Result<Option<NaiveDate>> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid due date {value:?}: {e}"))?;
    Ok(Some(date))
}
