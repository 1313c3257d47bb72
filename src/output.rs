//! Operator-facing console output.
//!
//! Log lines go through `tracing`; this module only prints the startup
//! banner, configuration dumps and the final session report.

use crate::config::{AppConfig, ConfigLoad, ScannerConfig};
use crate::error::ConfigResult;
use crate::supervisor::{SessionOutcome, SupervisorReport};
use console::{style, Style};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// One-line summary of a scanner's serial settings.
fn serial_summary(config: &ScannerConfig) -> String {
    let mut flow = Vec::new();
    if config.rts_cts {
        flow.push("rts/cts");
    }
    if config.dsr_dtr {
        flow.push("dsr/dtr");
    }
    let flow = if flow.is_empty() {
        "no flow control".to_string()
    } else {
        flow.join("+")
    };

    format!(
        "{} @ {} baud, 8N1, {}, timeout {}s",
        config.port, config.baud_rate, flow, config.read_timeout_secs
    )
}

/// Print the banner shown once before sessions start.
pub fn print_startup_banner(load: &ConfigLoad, opc_url: &str, deployed: &str) {
    println!();
    println!(
        "{} {} v{} (deployment {})",
        style("Starting").cyan(),
        style("scantag").cyan().bold(),
        env!("CARGO_PKG_VERSION"),
        style(deployed).dim()
    );
    println!("{} OPC UA: {}", style("•").dim(), style(opc_url).yellow());
    println!("{} Config: {}", style("•").dim(), load.source);
    println!(
        "{} Scanners: {}",
        style("•").dim(),
        style(load.config.scanners.len()).white().bold()
    );
    for (idx, scanner) in load.config.scanners.iter().enumerate() {
        println!(
            "    {} {}",
            style(format!("Scanner-{}", idx + 1)).bold(),
            serial_summary(scanner)
        );
    }
    println!();
}

/// Print the resolved configuration in human-readable form.
pub fn print_config(load: &ConfigLoad, deployed: &str) {
    let config = &load.config;

    println!();
    println!("{}", style(RULE).cyan());
    println!("  {} {}", style("Source:").bold(), load.source);
    println!("  {} {}", style("Deployment:").bold(), deployed);
    println!("  {} {}", style("Log level:").bold(), config.log_level);
    println!(
        "  {} {} days",
        style("Log retention:").bold(),
        config.log_retention_days
    );
    println!("{}", style(RULE).cyan());

    for (idx, scanner) in config.scanners.iter().enumerate() {
        println!();
        println!(
            "  {} {}",
            style(format!("Scanner-{}", idx + 1)).cyan().bold(),
            serial_summary(scanner)
        );
        println!("  {}", style(THIN_RULE).dim());
        println!("  {:<16} {}", "barcode", scanner.barcode_tag);
        println!("  {:<16} {}", "response", scanner.barcode_response_tag);
        println!("  {:<16} {}", "beep count", scanner.beep_count_tag);
        println!("  {:<16} {}", "health", scanner.health_tag);
        println!("  {:<16} {}", "health message", scanner.health_message_tag);
    }
    println!();
}

/// Print the configuration as the JSON document the loader accepts.
pub fn print_config_json(config: &AppConfig) -> ConfigResult<()> {
    let json = serde_json::to_string_pretty(&config.to_document()?)?;
    println!("{}", json);
    Ok(())
}

/// Print how each session ended.
pub fn print_report(report: &SupervisorReport) {
    println!();
    println!(
        "{} {}",
        style("Stopped:").bold(),
        if report.is_failure() {
            style(report.reason.to_string()).red().bold()
        } else {
            style(report.reason.to_string()).green()
        }
    );

    for session in &report.sessions {
        let outcome_style = match session.outcome {
            SessionOutcome::Stopped => Style::new().green(),
            SessionOutcome::Failed(_) => Style::new().red(),
            SessionOutcome::Panicked | SessionOutcome::Unresponsive => Style::new().red().bold(),
        };
        println!(
            "  {:<12} {:<16} {}",
            session.name,
            style(&session.port).dim(),
            outcome_style.apply_to(session.outcome.to_string())
        );
    }
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style("•").dim(), msg);
}

pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_summary() {
        let mut config = ScannerConfig::default_for(0);
        assert_eq!(
            serial_summary(&config),
            "/dev/ttyS0 @ 9600 baud, 8N1, no flow control, timeout 10s"
        );

        config.rts_cts = true;
        config.dsr_dtr = true;
        config.read_timeout_secs = 0.5;
        assert_eq!(
            serial_summary(&config),
            "/dev/ttyS0 @ 9600 baud, 8N1, rts/cts+dsr/dtr, timeout 0.5s"
        );
    }
}
