//! CLI argument parsing for the manutenza-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "manutenza-worker", about = "Manutenza maintenance-scheduling backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Upload the database files to the backup repository and exit
    Backup,
    /// Download missing database files from the backup repository and exit
    Restore,
    /// Hash a password interactively and print a users-file entry
    HashPassword {
        /// Username the entry is for
        #[arg(long)]
        username: String,
        /// Role recorded in the entry
        #[arg(long, default_value = "user")]
        role: String,
    },
}
