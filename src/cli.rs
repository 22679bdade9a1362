//! Interface de linha de comando do sentinel baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, once, check)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sentinel: aplica transições a documentos e executa tarefas agendadas.
#[derive(Debug, Parser)]
#[command(name = "sentinel", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./sentinel.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia o agendador e roda até receber Ctrl-C.
    Run,

    /// Executa um único ciclo de tarefas e sai.
    Once,

    /// Valida a configuração e lista as transições carregadas.
    Check,
}
