//! Interface de terminal do cardflow: renderização do quadro, spinner de
//! sincronização e avisos de reversão.
//!
//! Usa `indicatif` para o spinner e `console` para as cores.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use cardflow::error::WorkflowError;
use cardflow::model::CardState;
use cardflow::view::{ActiveBoard, CardView};

/// Spinner exibido enquanto a confirmação remota está em andamento.
///
/// A mudança já aparece localmente; o spinner só indica que o servidor
/// ainda não respondeu.
pub struct SyncProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl SyncProgress {
    pub fn start(operation: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("syncing {operation}..."));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow().bold(),
        }
    }

    /// Finaliza o spinner com o resultado do dispatch.
    pub fn finish<T>(&self, operation: &str, result: &Result<T, WorkflowError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(_) => println!("  {} {operation} saved", self.green.apply_to("✓")),
            Err(err) if err.was_reverted() => {
                println!(
                    "  {} {operation} reverted: {err}",
                    self.yellow.apply_to("↺")
                );
            }
            Err(err) => println!("  {} {err}", self.red.apply_to("✗")),
        }
    }
}

/// Aviso impresso depois que o quadro foi recarregado do servidor.
pub fn print_reloaded() {
    println!(
        "  {} column positions on the server had changed; board reloaded from the server",
        Style::new().yellow().bold().apply_to("!")
    );
}

fn state_style(state: CardState) -> Style {
    match state {
        CardState::New => Style::new().cyan(),
        CardState::InProgress => Style::new(),
        CardState::Escalated => Style::new().yellow().bold(),
        CardState::Won => Style::new().green().bold(),
        CardState::Lost => Style::new().red(),
        CardState::Archived | CardState::Done => Style::new().dim(),
    }
}

fn card_line(view: &CardView<'_>) -> String {
    let card = view.card;
    let mut line = format!(
        "    {} {} [{}] {}",
        state_style(view.state).apply_to(format!("{:<11}", view.state)),
        card.id,
        card.priority,
        card.title
    );
    if let Some(assignee) = &card.assignee {
        line.push_str(&format!(" @{assignee}"));
    }
    if let Some(due) = card.due_date {
        line.push_str(&format!(" due {due}"));
    }
    line
}

/// Imprime o quadro coluna a coluna, seguido da fila de escalonamento.
pub fn render_board(view: &ActiveBoard<'_>) {
    let header = Style::new().bold().underlined();
    let dim = Style::new().dim();

    println!("{}", header.apply_to(&view.board().name));
    for col in view.columns() {
        let mut title = format!("{} ({})", col.column.name, col.cards.len());
        if col.column.is_final {
            title.push_str(" final");
        }
        println!();
        println!(
            "  {} {}",
            Style::new().bold().apply_to(title),
            dim.apply_to(&col.column.id)
        );
        if col.cards.is_empty() {
            println!("    {}", dim.apply_to("(empty)"));
        }
        for card in &col.cards {
            println!("{}", card_line(card));
        }
    }

    let queue = view.escalation_queue();
    if !queue.is_empty() {
        println!();
        println!("{}", Style::new().yellow().bold().apply_to("Escalation queue"));
        for entry in queue {
            match entry.source {
                Some(source) => println!("    {} ← {}", entry.mirror.id, source.id),
                None => println!("    {}", entry.mirror.id),
            }
        }
    }
}
