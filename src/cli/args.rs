//! Command-line argument parsing for cortexrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::config::Config;

/// cortexrag - Answer questions from your documents with Cortex Search and Cortex completions
#[derive(Parser, Debug)]
#[command(name = "cortexrag")]
#[command(version)]
#[command(about = "Retrieval-augmented answers over a Cortex Search service", long_about = None)]
pub struct Args {
    /// Question to answer
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Completion model (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of passages to retrieve (overrides config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Drop retrieved passages that fail the context-relevance check
    #[arg(long)]
    pub filtered: bool,

    /// Score the answer with the evaluation feedbacks
    #[arg(long)]
    pub evaluate: bool,

    /// Print the full record as JSON
    #[arg(long)]
    pub json: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except final result)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run questions through both pipeline variants and compare feedback scores
    Eval {
        /// Questions to evaluate
        #[arg(value_name = "QUESTION")]
        questions: Vec<String>,

        /// File with one question per line
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Check secrets, configuration and login
    Doctor,

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Check if question is required and provided
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_none() && self.question.is_none() {
            return Err("Question required. Use 'cortexrag <QUESTION>' or run a subcommand.".to_string());
        }

        if self.command.is_some() && self.question.is_some() {
            return Err("Cannot specify a question with a subcommand.".to_string());
        }

        if self.limit == Some(0) {
            return Err("--limit must be greater than 0.".to_string());
        }

        if let Some(Commands::Eval { questions, file }) = &self.command {
            if questions.is_empty() && file.is_none() {
                return Err("eval needs at least one question or --file.".to_string());
            }
        }

        Ok(())
    }

    /// Apply command-line overrides to loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.completion.model = model.clone();
        }
        if let Some(limit) = self.limit {
            config.search.limit = limit;
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Parse the config-file spelling
    pub fn from_config(value: &str) -> Self {
        match value {
            "quiet" => Verbosity::Quiet,
            "verbose" => Verbosity::Verbose,
            "very_verbose" => Verbosity::VeryVerbose,
            _ => Verbosity::Normal,
        }
    }

    /// Log filter for this level
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show detailed events
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
