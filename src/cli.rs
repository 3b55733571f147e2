use crate::config::{AppConfig, FetchConfig};
use crate::monitor::registration::InvalidRegistration;
use crate::monitor::{
    load_registration_file, CheckOutcome, DiscordNotifier, HttpResultSource, Monitor, Notifier,
    RegistrationNumber, ResultSource,
};
use crate::shutdown::shutdown_signal;
use crate::utils::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "result-monitor",
    about = "Poll an exam-results site and post published results to Discord",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the result site and notify Discord (default command)
    Run(RunArgs),
    /// Fetch and classify one registration number without notifying Discord
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Override REG_NO_FILE
    #[arg(long)]
    pub reg_file: Option<PathBuf>,
    /// Stop after this many polling passes
    #[arg(long)]
    pub max_ticks: Option<u64>,
    /// Single polling pass, for cron-style schedules
    #[arg(long, conflicts_with = "max_ticks")]
    pub once: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.reg_file {
            config.registration_file = path.clone();
        }
        config.monitor.max_ticks = if self.once { Some(1) } else { self.max_ticks };
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Registration number to look up
    pub reg_no: String,
}

pub async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => run_monitor(args).await,
        Command::Check(args) => check_one(args).await,
    }
}

async fn run_monitor(args: RunArgs) -> Result<(), AppError> {
    let mut config = AppConfig::from_env()?;
    args.apply(&mut config);

    let notifier = DiscordNotifier::new(config.webhook_url.clone(), config.notifier.clone());

    let list =
        match load_registration_file(&config.registration_file, config.registration_length).await
        {
            Ok(list) => list,
            Err(e) => {
                let message = match &e {
                    AppError::NoRegistrationNumbers => {
                        "❌ **No valid registration numbers found**".to_string()
                    }
                    _ => format!("⚠️ **File error:** `{}`", e),
                };
                if let Err(send_err) = notifier.send_text(&message).await {
                    warn!(error = %send_err, "Could not report registration file error");
                }
                return Err(e);
            }
        };

    if !list.rejected.is_empty() {
        let message = rejected_message(&list.rejected);
        if let Err(e) = notifier.send_text(&message).await {
            warn!(error = %e, "Could not report rejected registration numbers");
        }
    }

    let source = HttpResultSource::new(config.fetch.clone())?;
    let mut monitor = Monitor::new(source, notifier, config.monitor.clone(), list.numbers);
    let summary = monitor.run(shutdown_signal()).await;

    info!(
        reason = %summary.reason,
        found = summary.found.len(),
        pending = summary.pending.len(),
        "Run complete"
    );
    Ok(())
}

async fn check_one(args: CheckArgs) -> Result<(), AppError> {
    let fetch = FetchConfig::from_env()?;
    let reg_no = RegistrationNumber::parse(&args.reg_no, None)
        .map_err(|reason| AppError::InvalidRegistration(reason.to_string()))?;
    let url = fetch.result_url(&reg_no);
    let source = HttpResultSource::new(fetch)?;

    match source.check(&reg_no).await {
        CheckOutcome::NotYetPublished => println!("{}: not yet published ({})", reg_no, url),
        CheckOutcome::Published { metadata, .. } => {
            println!(
                "{}: published ({} bytes, HTTP {}, title: {})",
                reg_no,
                metadata.size,
                metadata.status,
                metadata.title.as_deref().unwrap_or("-")
            );
        }
        CheckOutcome::Error(reason) => println!("{}: error: {}", reg_no, reason),
    }
    Ok(())
}

fn rejected_message(rejected: &[(usize, String, InvalidRegistration)]) -> String {
    let mut message = format!(
        "❌ **Skipped {} invalid registration number(s):**",
        rejected.len()
    );
    for (line, raw, reason) in rejected {
        message.push_str(&format!("\n- line {}: `{}` ({})", line, raw, reason));
    }
    message
}
