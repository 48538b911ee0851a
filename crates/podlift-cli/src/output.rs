use std::sync::Mutex;

use podlift_common::DeploymentStatus;
use podlift_deploy::{
    Event, EventSink, InstructionText, PipelineError, PipelineReport, ProvisionOutcome, Severity,
    Stage,
};

/// Prints progress for humans: a header per stage, one line per event.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    current: Mutex<Option<Stage>>,
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: Event) {
        tracing::debug!(stage = %event.stage, severity = ?event.severity, message = %event.message, "progress");

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if *current != Some(event.stage) {
            *current = Some(event.stage);
            println!("\n[Step {}] {}", event.stage.number(), event.stage.title());
        }
        let symbol = match event.severity {
            Severity::Info => " ",
            Severity::Success => "✓",
            Severity::Warning => "⚠",
            Severity::Error => "✗",
        };
        match event.severity {
            Severity::Error => eprintln!("  {symbol} {}", event.message),
            _ => println!("  {symbol} {}", event.message),
        }
    }
}

pub fn print_report(report: &PipelineReport) {
    println!("\n=== Deployment Summary ===");
    println!("  Image:     {}", report.artifact.reference());
    match &report.outcome {
        ProvisionOutcome::Deployed(result) => {
            println!("  Endpoint:  {}", result.endpoint_id);
            println!("  URL:       {}", result.endpoint_url);
            println!("  Status:    {}", result.status);
            match result.status {
                DeploymentStatus::Failed => println!(
                    "\n⚠ The endpoint exists but its workers are failing; check its logs in the console"
                ),
                _ => println!("\nSend requests to {}/runsync", result.endpoint_url),
            }
        }
        ProvisionOutcome::Manual {
            reason,
            instructions,
        } => {
            println!("  Endpoint:  not created ({reason})");
            print_instructions(instructions);
        }
    }
    println!();
}

pub fn print_instructions(instructions: &InstructionText) {
    println!("\nTo create the endpoint manually:\n");
    print!("{instructions}");
}

pub fn print_failure(err: &PipelineError) {
    eprintln!("\n✗ {} failed: {err}", err.stage().title());
    eprintln!("  {}", err.remediation());
}
