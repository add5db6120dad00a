//! Doctor command for setup diagnostics
//!
//! Checks secrets, configuration and login before any question is asked.

use colored::Colorize;
use std::path::PathBuf;

use crate::cli::Config;
use crate::session::{Credentials, Session};

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

/// Doctor diagnostics system
pub struct Doctor {
    config_path: Option<PathBuf>,
}

impl Doctor {
    /// Create a new doctor instance
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let _ = dotenvy::dotenv();
        let lookup = |key: &str| std::env::var(key).ok();

        let mut checks = vec![Self::check_secrets(lookup)];

        let config = Config::load(self.config_path.clone());
        checks.push(match &config {
            Ok(_) => HealthCheck {
                name: "Configuration".to_string(),
                status: HealthStatus::Pass,
            },
            Err(e) => HealthCheck {
                name: "Configuration".to_string(),
                status: HealthStatus::Fail(e.to_string()),
            },
        });

        checks.push(match (Credentials::from_lookup(lookup), config) {
            (Ok(credentials), Ok(config)) => Self::check_login(&credentials, &config).await,
            _ => HealthCheck {
                name: "Login".to_string(),
                status: HealthStatus::Warn("Skipped: secrets or configuration invalid".to_string()),
            },
        });

        checks
    }

    /// Check 1: every required secret is set
    pub fn check_secrets<F>(lookup: F) -> HealthCheck
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = Credentials::missing(&lookup);
        let status = if missing.is_empty() {
            HealthStatus::Pass
        } else {
            HealthStatus::Fail(format!("Missing: {}", missing.join(", ")))
        };

        HealthCheck {
            name: "Secrets".to_string(),
            status,
        }
    }

    /// Check 3: the account accepts our credentials
    async fn check_login(credentials: &Credentials, config: &Config) -> HealthCheck {
        let status = match Session::connect(credentials, &config.connection).await {
            Ok(session) => {
                if credentials.pat.is_some() {
                    HealthStatus::Warn(format!(
                        "Access token configured for {} (not verified until first request)",
                        session.base_url()
                    ))
                } else {
                    HealthStatus::Pass
                }
            }
            Err(e) => HealthStatus::Fail(e.to_string()),
        };

        HealthCheck {
            name: "Login".to_string(),
            status,
        }
    }

    /// Display health check results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "cortexrag doctor".bold());
        println!("{:<20} {}", "Check", "Status");
        println!("{}", "=".repeat(50));

        for check in checks {
            let message = match &check.status {
                HealthStatus::Pass => "PASS".green().to_string(),
                HealthStatus::Warn(msg) => format!("WARN: {}", msg).yellow().to_string(),
                HealthStatus::Fail(msg) => format!("FAIL: {}", msg).red().to_string(),
            };
            println!("{:<20} {}", check.name, message);
        }

        println!();
    }

    /// True when no check failed
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}
