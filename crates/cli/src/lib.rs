pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use escalade_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

use crate::commands::resolve::ResolveRequest;
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "escalade",
    about = "Escalation policy CLI",
    long_about = "Resolve who to notify about inactive work, when, and after how many days.",
    after_help = "Examples:\n  escalade resolve --priority high --days 5 --person alice\n  escalade threshold --tool no_severity --days 10\n  escalade policy --priority high\n  escalade check"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to the policy file (defaults to escalade.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the configured log level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override the configured log format (compact|pretty|json)")]
    log_format: Option<String>,
    #[arg(long, global = true, help = "Drop malformed policy entries with a warning instead of failing")]
    lenient: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Resolve the contact to notify and whether today is a notification day")]
    Resolve {
        #[arg(long, help = "high|normal|default")]
        priority: String,
        #[arg(long, help = "Days of inactivity")]
        days: u32,
        #[arg(long, help = "Person whose work is inactive")]
        person: String,
        #[arg(long, help = "Weekday to check (defaults to today)")]
        weekday: Option<String>,
        #[arg(long, help = "Tool whose escalation table to use")]
        tool: Option<String>,
        #[arg(long, requires = "tool", help = "Escalation variant of the tool")]
        variant: Option<String>,
        #[arg(long = "contact", help = "Named role contact as role=person (repeatable)")]
        contacts: Vec<String>,
    },
    #[command(about = "Look up the inactivity threshold of a tool")]
    Threshold {
        #[arg(long)]
        tool: String,
        #[arg(long)]
        days: u32,
    },
    #[command(about = "Print the ordered steps of an escalation table")]
    Policy {
        #[arg(long)]
        tool: Option<String>,
        #[arg(long, requires = "tool")]
        variant: Option<String>,
        #[arg(long, help = "high|normal|default (all when omitted)")]
        priority: Option<String>,
    },
    #[command(about = "Load every policy table and report named contact requirements")]
    Check,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Resolve { .. } => "resolve",
            Self::Threshold { .. } => "threshold",
            Self::Policy { .. } => "policy",
            Self::Check => "check",
            Self::Config => "config",
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = execute(cli);

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn execute(cli: Cli) -> CommandResult {
    let command_name = cli.command.name();
    let log_format = match cli.log_format.as_deref().map(str::parse::<LogFormat>).transpose() {
        Ok(log_format) => log_format,
        Err(error) => return CommandResult::from_config_error(command_name, &error),
    };
    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides {
            log_level: cli.log_level,
            log_format,
            strict: cli.lenient.then_some(false),
        },
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_config_error(command_name, &error),
    };
    if let Err(error) = logging::init(&config.logging) {
        return CommandResult::failure(command_name, "logging", error.to_string(), 1);
    }

    match cli.command {
        Command::Resolve { priority, days, person, weekday, tool, variant, contacts } => {
            commands::resolve::run(
                &config,
                &ResolveRequest { priority, days, person, weekday, tool, variant, contacts },
            )
        }
        Command::Threshold { tool, days } => commands::threshold::run(&config, &tool, days),
        Command::Policy { tool, variant, priority } => {
            commands::policy::run(&config, tool.as_deref(), variant.as_deref(), priority.as_deref())
        }
        Command::Check => commands::check::run(&config),
        Command::Config => {
            CommandResult { exit_code: 0, output: commands::config::run(&config, cli.config.as_deref()) }
        }
    }
}
