//! Saída de terminal do sentinel com cores via `console`.
//!
//! Formata o relatório de inicialização (transições carregadas, desabilitadas
//! ou com falha) e o resultado de cada ciclo do agendador.

use console::Style;

use crate::registry::StartupReport;
use crate::scheduler::{TaskStatus, TickReport};

/// Estilos usados em toda a saída.
pub struct Palette {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }
}

impl Palette {
    /// Linhas do relatório de inicialização, sem terminador.
    pub fn startup_lines(&self, report: &StartupReport) -> Vec<String> {
        let mut lines = Vec::new();
        for name in &report.loaded {
            lines.push(format!("  {} {name}", self.green.apply_to("✓")));
        }
        for name in &report.disabled {
            lines.push(format!("  {} {name} (disabled)", self.dim.apply_to("-")));
        }
        for (name, error) in &report.failed {
            lines.push(format!("  {} {name}: {error}", self.red.apply_to("✗")));
        }
        lines
    }

    /// Uma linha por tarefa executada no ciclo.
    pub fn tick_lines(&self, report: &TickReport) -> Vec<String> {
        report
            .runs
            .iter()
            .map(|run| {
                let elapsed = self.dim.apply_to(format!("{:.2?}", run.elapsed));
                match &run.status {
                    TaskStatus::Completed => {
                        format!("  {} {} {elapsed}", self.green.apply_to("✓"), run.task)
                    }
                    TaskStatus::OutsideWindow => format!(
                        "  {} {} (outside sendable window)",
                        self.yellow.apply_to("…"),
                        run.task
                    ),
                    TaskStatus::Failed(e) => {
                        format!("  {} {}: {e}", self.red.apply_to("✗"), run.task)
                    }
                }
            })
            .collect()
    }
}

/// Imprime o relatório de inicialização.
pub fn print_startup(report: &StartupReport) {
    println!("Transitions:");
    for line in Palette::default().startup_lines(report) {
        println!("{line}");
    }
}

/// Imprime o resultado de um ciclo.
pub fn print_tick(report: &TickReport) {
    println!("Tasks:");
    for line in Palette::default().tick_lines(report) {
        println!("{line}");
    }
}
