//! cortexrag - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cortexrag::{
    bootstrap::Bootstrap,
    cli::{Args, Commands, Config, Verbosity},
    doctor::Doctor,
    feedback::{Leaderboard, Record},
    session::Credentials,
    telemetry::TelemetryDisplay,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(2);
    }

    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let verbosity = match args.verbosity() {
        Verbosity::Normal => Verbosity::from_config(&config.telemetry.default_verbosity),
        explicit => explicit,
    };
    init_tracing(verbosity);

    match &args.command {
        Some(Commands::Doctor) => run_doctor(&args).await,
        Some(Commands::Config) => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Commands::Eval { questions, file }) => {
            let questions = collect_questions(questions, file.as_deref())?;
            run_eval(config, &questions, verbosity).await
        }
        None => {
            let question = args.question.clone().unwrap_or_default();
            run_question(config, &args, &question, verbosity).await
        }
    }
}

/// Logs go to stderr; RUST_LOG overrides the verbosity flags
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cortexrag={}", verbosity.log_filter())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(verbosity: Verbosity, message: &str) -> ProgressBar {
    if !verbosity.show_progress() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn connect(config: Config) -> Result<Bootstrap> {
    let credentials = Credentials::from_env().context("Failed to read connection secrets")?;
    Bootstrap::connect(config, &credentials)
        .await
        .context("Failed to open session")
}

/// Answer one question with the selected pipeline variant
async fn run_question(config: Config, args: &Args, question: &str, verbosity: Verbosity) -> Result<()> {
    let bootstrap = connect(config).await?;
    let app = bootstrap.recorded_app(args.filtered);

    let pb = spinner(verbosity, "Retrieving and generating");
    let result = app.record(question).await;
    pb.finish_and_clear();
    let mut record = result?;

    if args.evaluate {
        let pb = spinner(verbosity, "Evaluating");
        let result = app.evaluate_record(&mut record).await;
        pb.finish_and_clear();
        result?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        if verbosity.show_events() {
            print_context(&record);
        }
        println!("{}", record.trace.answer.trim());
        if !record.feedback.is_empty() {
            print_feedback(&record);
        }
    }

    let display = TelemetryDisplay::new(bootstrap.telemetry().clone(), verbosity);
    if display.should_show_details() {
        display.display_summary();
    }

    Ok(())
}

/// Run every question through both variants and print the leaderboard
async fn run_eval(config: Config, questions: &[String], verbosity: Verbosity) -> Result<()> {
    let bootstrap = connect(config).await?;
    let apps = [bootstrap.recorded_app(false), bootstrap.recorded_app(true)];
    let mut leaderboard = Leaderboard::new();

    for app in &apps {
        for question in questions {
            let pb = spinner(
                verbosity,
                &format!("{} {}: {}", app.app_name(), app.app_version(), question),
            );
            let result = async {
                let mut record = app.record(question).await?;
                app.evaluate_record(&mut record).await?;
                Ok::<Record, cortexrag::RagError>(record)
            }
            .await;
            pb.finish_and_clear();

            let record = result.with_context(|| format!("Failed on question: {}", question))?;
            if verbosity.show_events() {
                print_feedback(&record);
            }
            leaderboard.add(record);
        }
    }

    print_leaderboard(&leaderboard);

    let display = TelemetryDisplay::new(bootstrap.telemetry().clone(), verbosity);
    if display.should_show_details() {
        display.display_summary();
    }

    Ok(())
}

async fn run_doctor(args: &Args) -> Result<()> {
    let doctor = Doctor::new(args.config.clone());
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    if !Doctor::overall_status(&checks) {
        std::process::exit(1);
    }
    Ok(())
}

fn collect_questions(questions: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut all = questions.to_vec();
    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read questions from {}", path.display()))?;
        all.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    Ok(all)
}

fn print_context(record: &Record) {
    let trace = &record.trace;
    eprintln!("{}", "Retrieved context".bold());
    match trace.filter_verdicts() {
        Some(verdicts) => {
            for (passage, kept) in verdicts {
                let mark = if kept { "kept".green() } else { "dropped".red() };
                eprintln!("  [{:.2} {}] {}", passage.score, mark, passage.text);
            }
        }
        None => {
            for passage in &trace.retrieved {
                eprintln!("  - {}", passage);
            }
        }
    }
    if trace.context.is_empty() {
        eprintln!("  {}", "(no context reached the prompt)".yellow());
    }
    eprintln!();
}

fn print_feedback(record: &Record) {
    println!();
    for result in &record.feedback {
        println!("{:<20} {:.2}", result.name, result.score);
        for reason in &result.reasons {
            println!("  {}", reason.dimmed());
        }
    }
}

fn print_leaderboard(leaderboard: &Leaderboard) {
    let rows = leaderboard.rows();
    let mut feedback_names: Vec<String> = rows
        .iter()
        .flat_map(|row| row.scores.keys().cloned())
        .collect();
    feedback_names.sort();
    feedback_names.dedup();

    print!("\n{:<8} {:<8} {:>7}", "App", "Version", "Records");
    for name in &feedback_names {
        print!(" {:>18}", name);
    }
    println!(" {:>12}", "Latency (ms)");
    println!("{}", "─".repeat(26 + 19 * feedback_names.len() + 13));

    for row in rows {
        print!("{:<8} {:<8} {:>7}", row.app_name, row.app_version, row.records);
        for name in &feedback_names {
            match row.scores.get(name) {
                Some(score) => print!(" {:>18.2}", score),
                None => print!(" {:>18}", "-"),
            }
        }
        println!(" {:>12.0}", row.mean_latency_ms);
    }
    println!();
}
