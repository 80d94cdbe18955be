use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "mesh-monitor")]
#[command(about = "Liveness and state-history monitor for mesh network nodes", long_about = None)]
pub struct Cli {
    /// Use the in-memory store even if DATABASE_URL is set.
    #[arg(long)]
    pub memory: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the liveness sweeper and an interactive console (default).
    Console,
    /// Run a single liveness sweep and print the report.
    Sweep,
    /// Create the database schema and exit.
    InitDb,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Console)
    }
}
