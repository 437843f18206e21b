use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::fs;
use tracing::info;
use tracing::warn;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use dashwright::builder::DashboardBuilder;
use dashwright::common;
use dashwright::merge::{self, MergeStrategy};
use dashwright::ops;
use dashwright::parse;
use dashwright::repair;
use dashwright::summary::{self, VariablesFormat};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Validate {
        file: String,
        /// Emit the validation report as JSON
        #[clap(long)]
        json: bool,
    },
    Repair {
        file: String,
        #[clap(short, long)]
        output: Option<String>,
    },
    Merge {
        primary: String,
        secondary: String,
        /// append, replace or merge
        #[clap(short, long, default_value = "append")]
        strategy: String,
        #[clap(short, long)]
        output: Option<String>,
    },
    Apply {
        dashboard: String,
        operations: String,
        #[clap(short, long)]
        output: Option<String>,
    },
    Inspect {
        file: String,
        /// list, summary or detailed
        #[clap(long, default_value = "detailed")]
        variables: String,
    },
    Init {
        file: String,
        #[clap(short, long, default_value = "New Dashboard")]
        title: String,
    },
}

fn write_or_print(output: &Option<String>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            common::write_string_to_file(path, content)?;
            info!("Wrote output to: {}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Validate { file, json } => {
            let outcome = parse::parse_dashboard_file(&file)?;
            for message in &outcome.messages {
                warn!("{}", message);
            }
            let report = outcome.dashboard.validation_report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if report.is_valid() {
                    println!("OK: dashboard is structurally valid");
                }
                for error in &report.errors {
                    println!("ERROR: {}", error);
                }
                for warning in &report.warnings {
                    println!("WARNING: {}", warning);
                }
            }
            if !report.is_valid() {
                std::process::exit(1);
            }
        }
        Commands::Repair { file, output } => {
            let text = fs::read_to_string(&file)?;
            let extraction = repair::extract_json(&text)?;
            for warning in &extraction.warnings {
                warn!("{}", warning);
            }
            let rendered = serde_json::to_string_pretty(&extraction.value)?;
            write_or_print(&output, &rendered)?;
        }
        Commands::Merge {
            primary,
            secondary,
            strategy,
            output,
        } => {
            let strategy = match MergeStrategy::from_name(&strategy) {
                Some(strategy) => strategy,
                None => bail!("Unknown merge strategy: {}", strategy),
            };
            let primary = parse::parse_dashboard_file(&primary)?;
            let secondary = parse::parse_dashboard_file(&secondary)?;
            let outcome =
                merge::merge_dashboards(&primary.dashboard, &secondary.dashboard, strategy);
            for warning in &outcome.warnings {
                warn!("{}", warning);
            }
            write_or_print(&output, &outcome.dashboard.to_json_string(true))?;
        }
        Commands::Apply {
            dashboard,
            operations,
            output,
        } => {
            let parsed = parse::parse_dashboard_file(&dashboard)?;
            for message in &parsed.messages {
                warn!("{}", message);
            }
            let mut dashboard = parsed.dashboard;

            let text = fs::read_to_string(&operations)?;
            let extraction = repair::extract_json(&text)?;
            for warning in &extraction.warnings {
                warn!("{}", warning);
            }
            let operations = match extraction.value.as_array() {
                Some(items) => items.clone(),
                None => bail!("Operations file must contain a JSON array"),
            };
            info!("Successfully extracted {} panel operations", operations.len());

            let report = ops::apply_operations(&mut dashboard, &operations);
            for message in &report.messages {
                println!("{}", message);
            }
            if !report.success {
                bail!("Applying operations failed");
            }
            write_or_print(&output, &dashboard.to_json_string(true))?;
        }
        Commands::Inspect { file, variables } => {
            let outcome = parse::parse_dashboard_file(&file)?;
            for message in &outcome.messages {
                warn!("{}", message);
            }
            println!("{}", summary::render_overview(&outcome.dashboard));
            println!(
                "{}",
                summary::render_variables(&outcome.dashboard, VariablesFormat::from_name(&variables))
            );
        }
        Commands::Init { file, title } => {
            info!("Initializing dashboard: {}", file);
            let dashboard = DashboardBuilder::new(title)
                .add_timeseries_panel("Sample Panel", vec![], None)
                .build();
            common::write_string_to_file(&file, &dashboard.to_json_string(true))?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}
