//! CLI module - Command-line interface for VBG Tracker
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// VBG Tracker - gender-based violence case management API
#[derive(Parser)]
#[command(name = "vbg-tracker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create an account directly in the database
    CreateUser {
        /// Login name
        #[arg(long)]
        username: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// agent, admin or super-admin
        #[arg(long, default_value = "agent")]
        role: String,

        /// Required for agents and admins
        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Clear the failed-login counter and any active lock
    UnlockUser {
        username: String,
    },

    /// Create default config file
    #[command(alias = "init")]
    InitConfig,
}

pub use commands::*;
