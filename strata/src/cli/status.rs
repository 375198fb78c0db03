// strata/src/cli/status.rs
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;

use colored::*;
use strata_common::pipeline::BuildEvent;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantStatus {
    Waiting,
    Resolving,
    Planning,
    Executing,
    UpToDate,
    Success,
    Failed,
}

impl VariantStatus {
    fn display_state(&self) -> &'static str {
        match self {
            VariantStatus::Waiting => "waiting",
            VariantStatus::Resolving => "resolving",
            VariantStatus::Planning => "planning",
            VariantStatus::Executing => "executing",
            VariantStatus::UpToDate => "up-to-date",
            VariantStatus::Success => "success",
            VariantStatus::Failed => "failed",
        }
    }

    fn slot_indicator(&self) -> String {
        match self {
            VariantStatus::Waiting => " ·".dimmed().to_string(),
            VariantStatus::Resolving => " ◌".yellow().to_string(),
            VariantStatus::Planning => " ◌".blue().to_string(),
            VariantStatus::Executing => " ⚙".magenta().to_string(),
            VariantStatus::UpToDate => " =".cyan().to_string(),
            VariantStatus::Success => " ✓".green().bold().to_string(),
            VariantStatus::Failed => " ✗".red().bold().to_string(),
        }
    }

    fn colored_state(&self) -> ColoredString {
        match self {
            VariantStatus::Waiting => self.display_state().dimmed(),
            VariantStatus::Resolving => self.display_state().yellow(),
            VariantStatus::Planning => self.display_state().blue(),
            VariantStatus::Executing => self.display_state().magenta(),
            VariantStatus::UpToDate => self.display_state().cyan(),
            VariantStatus::Success => self.display_state().green().bold(),
            VariantStatus::Failed => self.display_state().red().bold(),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            VariantStatus::UpToDate | VariantStatus::Success | VariantStatus::Failed
        )
    }
}

struct VariantInfo {
    name: String,
    status: VariantStatus,
    detail: String,
    slot_id: usize,
}

struct StatusDisplay {
    variants: HashMap<String, VariantInfo>,
    variant_order: Vec<String>,
    total_variants: usize,
    next_slot_id: usize,
    start_time: Instant,
    header_printed: bool,
    last_line_count: usize,
}

impl StatusDisplay {
    fn new() -> Self {
        Self {
            variants: HashMap::new(),
            variant_order: Vec::new(),
            total_variants: 0,
            next_slot_id: 1,
            start_time: Instant::now(),
            header_printed: false,
            last_line_count: 0,
        }
    }

    fn add_variant(&mut self, variant_id: String, status: VariantStatus) {
        if !self.variants.contains_key(&variant_id) {
            let info = VariantInfo {
                name: variant_id.clone(),
                status,
                detail: String::new(),
                slot_id: self.next_slot_id,
            };
            self.variants.insert(variant_id.clone(), info);
            self.variant_order.push(variant_id);
            self.next_slot_id += 1;
        }
    }

    fn update(&mut self, variant_id: &str, status: VariantStatus, detail: Option<String>) {
        if !self.variants.contains_key(variant_id) {
            self.add_variant(variant_id.to_string(), status);
        }
        if let Some(info) = self.variants.get_mut(variant_id) {
            info.status = status;
            if let Some(detail) = detail {
                info.detail = detail;
            }
        }
    }

    fn render(&mut self) {
        if self.header_printed {
            self.clear_previous_output();
        }
        self.print_header();
        let rows = self.build_rows();
        print!("{rows}");
        self.header_printed = true;
        self.last_line_count = 1 + rows.lines().count() + 1 + 1;

        println!("{}", "─".repeat(52).dimmed());

        let done = self
            .variants
            .values()
            .filter(|v| v.status.is_terminal())
            .count();
        let failed = self
            .variants
            .values()
            .filter(|v| v.status == VariantStatus::Failed)
            .count();
        println!(
            "{} {}/{} done, {} failed",
            self.progress_bar(done),
            done,
            self.total_variants.max(self.variants.len()),
            failed
        );

        io::stdout().flush().unwrap();
    }

    fn print_header(&self) {
        println!(
            "{:<5} {:<12} {:<16} {:<18} {}",
            "VID".bold().dimmed(),
            "STATE".bold().dimmed(),
            "VARIANT".bold().dimmed(),
            "DETAIL".bold().dimmed(),
            "SLOT".bold().dimmed()
        );
    }

    fn build_rows(&self) -> String {
        let mut output = String::new();
        for variant_id in &self.variant_order {
            if let Some(info) = self.variants.get(variant_id) {
                output.push_str(&format!(
                    "{:<5} {:<12} {:<16} {:<18} {}\n",
                    format!("#{:02}", info.slot_id).cyan(),
                    info.status.colored_state(),
                    info.name.cyan(),
                    info.detail,
                    info.status.slot_indicator()
                ));
            }
        }
        output
    }

    fn clear_previous_output(&self) {
        for _ in 0..self.last_line_count {
            print!("\x1b[1A\x1b[2K"); // Move up one line and clear it
        }
        io::stdout().flush().unwrap();
    }

    fn progress_bar(&self, done: usize) -> String {
        let total = self.total_variants.max(self.variants.len());
        if total == 0 {
            return String::new();
        }
        let width = 8;
        let filled = (done * width) / total;
        format!(
            "{}{}",
            "▍".repeat(filled).green(),
            "·".repeat(width - filled).dimmed()
        )
    }
}

pub async fn handle_events(mut event_rx: broadcast::Receiver<BuildEvent>) {
    let mut display = StatusDisplay::new();
    let mut logs_buffer: Vec<String> = Vec::new();
    let mut pipeline_active = false;

    loop {
        match event_rx.recv().await {
            Ok(event) => match event {
                BuildEvent::OrchestrationStarted { total_variants } => {
                    pipeline_active = true;
                    display.total_variants = total_variants;
                    println!("{}", "Starting variant builds...".cyan().bold());
                }
                BuildEvent::CrossCheckStarted { packages } => {
                    println!(
                        "{} {}",
                        "Cross-checking shared pins:".cyan(),
                        packages.join(", ")
                    );
                }
                BuildEvent::CrossCheckPassed => {
                    println!("{}", "Shared pins agree across variants.".cyan());
                }
                BuildEvent::VariantStarted { variant_id } => {
                    display.add_variant(variant_id, VariantStatus::Resolving);
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::ResolutionStarted { variant_id } => {
                    display.update(&variant_id, VariantStatus::Resolving, None);
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::ResolutionFinished {
                    variant_id,
                    package_count,
                } => {
                    display.update(
                        &variant_id,
                        VariantStatus::Planning,
                        Some(format!("{package_count} package(s)")),
                    );
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::PlanningFinished {
                    variant_id,
                    step_count,
                } => {
                    display.update(
                        &variant_id,
                        VariantStatus::Planning,
                        Some(format!("{step_count} step(s)")),
                    );
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::VariantUpToDate { variant_id } => {
                    display.update(&variant_id, VariantStatus::UpToDate, None);
                    logs_buffer.push(format!(
                        "{} {} is already up to date.",
                        "=".cyan(),
                        variant_id.cyan()
                    ));
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::CheckoutStarted {
                    variant_id,
                    package,
                    url,
                } => {
                    logs_buffer.push(format!(
                        "{} {}: checking out {} from {}",
                        "→".dimmed(),
                        variant_id.cyan(),
                        package,
                        url.dimmed()
                    ));
                }
                BuildEvent::StepStarted {
                    variant_id,
                    index,
                    total,
                    label,
                    package_count,
                } => {
                    display.update(
                        &variant_id,
                        VariantStatus::Executing,
                        Some(format!(
                            "step {}/{} {} ({package_count})",
                            index + 1,
                            total,
                            label
                        )),
                    );
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::StepFinished { .. } => {}
                BuildEvent::VariantSucceeded {
                    variant_id,
                    artifact_path,
                } => {
                    display.update(&variant_id, VariantStatus::Success, None);
                    logs_buffer.push(format!(
                        "{}: {} -> {}",
                        "Built".green(),
                        variant_id.cyan(),
                        artifact_path.display()
                    ));
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::VariantFailed { variant_id, error } => {
                    display.update(&variant_id, VariantStatus::Failed, None);
                    logs_buffer.push(format!(
                        "{} {}: {}",
                        "✗".red().bold(),
                        variant_id.cyan(),
                        error.red()
                    ));
                    if pipeline_active {
                        display.render();
                    }
                }
                BuildEvent::LogInfo { message } => {
                    logs_buffer.push(message);
                }
                BuildEvent::LogWarn { message } => {
                    logs_buffer.push(message.yellow().to_string());
                }
                BuildEvent::LogError { message } => {
                    logs_buffer.push(message.red().to_string());
                }
                BuildEvent::OrchestrationFinished {
                    duration_secs,
                    success_count,
                    fail_count,
                } => {
                    if display.header_printed {
                        display.render();
                    }
                    println!();
                    println!(
                        "{} in {:.2}s ({} succeeded, {} failed)",
                        "Build finished".bold(),
                        duration_secs,
                        success_count,
                        fail_count
                    );
                    if !logs_buffer.is_empty() {
                        println!();
                        for log in &logs_buffer {
                            println!("{log}");
                        }
                    }
                    let elapsed = display.start_time.elapsed().as_secs_f64();
                    println!(
                        "\n{}: {}  {}: {}  {}: {}  {}: {:.2}s",
                        "Variants".bold(),
                        display.total_variants,
                        "Succeeded".green().bold(),
                        success_count,
                        "Failed".red().bold(),
                        fail_count,
                        "Elapsed".bold(),
                        elapsed
                    );
                    break;
                }
            },
            Err(broadcast::error::RecvError::Closed) => {
                break;
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                // Ignore lag for now
            }
        }
    }
}
