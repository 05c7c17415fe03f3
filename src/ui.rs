use crate::actions::{ActionId, ActionOutcome};
use crate::compress::{Bundle, BundleFormat};
use crate::errors::AcqResult;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
}

/// Per-file progress bar; hidden when progress output is off.
pub fn file_progress(prefix: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(bar_style());
    bar.set_prefix(style(prefix.to_string()).green().bold().to_string());
    bar
}

pub fn compression_progress(format: BundleFormat, hidden: bool) -> ProgressBar {
    file_progress(&format!("📦 {}", format.extension()), hidden)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    AutoAcquisition,
    ManualAction,
    Compress,
    ToggleEnforcement,
    Exit,
}

pub fn parse_menu_choice(input: &str) -> Option<MenuChoice> {
    match input.trim() {
        "1" => Some(MenuChoice::AutoAcquisition),
        "2" => Some(MenuChoice::ManualAction),
        "3" => Some(MenuChoice::Compress),
        "4" => Some(MenuChoice::ToggleEnforcement),
        "0" | "q" | "exit" => Some(MenuChoice::Exit),
        _ => None,
    }
}

/// `1`..`5` pick an action in auto order, `0` goes back.
pub fn parse_action_choice(input: &str) -> Option<Option<ActionId>> {
    let index: usize = input.trim().parse().ok()?;
    match index {
        0 => Some(None),
        n => ActionId::ALL.get(n - 1).copied().map(Some),
    }
}

pub fn parse_format_choice(input: &str) -> Option<BundleFormat> {
    match input.trim() {
        "1" | "zip" => Some(BundleFormat::Zip),
        "2" | "tar" => Some(BundleFormat::Tar),
        "3" | "tar.gz" | "tar-gz" => Some(BundleFormat::TarGz),
        _ => None,
    }
}

/// Interactive operator console on the controlling terminal.
pub struct Console {
    term: Term,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self { term: Term::stdout() }
    }

    fn boxed(&self, title: &str, lines: &[String]) -> io::Result<()> {
        let width = lines
            .iter()
            .map(|l| console::measure_text_width(l))
            .chain(std::iter::once(title.len()))
            .max()
            .unwrap_or(0)
            + 4;
        self.term
            .write_line(&style(format!("╔{}╗", "═".repeat(width))).cyan().to_string())?;
        self.term.write_line(&format!(
            "{}  {:<w$}  {}",
            style("║").cyan(),
            style(title).bold(),
            style("║").cyan(),
            w = width - 4
        ))?;
        self.term
            .write_line(&style(format!("╠{}╣", "═".repeat(width))).cyan().to_string())?;
        for line in lines {
            let pad = width - 4 - console::measure_text_width(line);
            self.term.write_line(&format!(
                "{}  {}{}  {}",
                style("║").cyan(),
                line,
                " ".repeat(pad),
                style("║").cyan()
            ))?;
        }
        self.term
            .write_line(&style(format!("╚{}╝", "═".repeat(width))).cyan().to_string())
    }

    /// Ask until `parse` accepts the answer.
    fn ask<T>(&self, question: &str, parse: impl Fn(&str) -> Option<T>) -> io::Result<T> {
        loop {
            self.term.write_str(&format!("{} ", style(question).yellow().bold()))?;
            let answer = self.term.read_line()?;
            match parse(&answer) {
                Some(value) => return Ok(value),
                None => self
                    .term
                    .write_line(&style(format!("Invalid choice: '{}'", answer.trim())).red().to_string())?,
            }
        }
    }

    pub fn banner(&self, device: &str, output: &str) -> io::Result<()> {
        self.boxed(
            "ITeratOr - WearOS acquisition",
            &[
                format!("Device   {}", device),
                format!("Output   {}", output),
                format!("Examiner {}", whoami::username()),
            ],
        )
    }

    pub fn main_menu(&self, enforcement: bool) -> io::Result<MenuChoice> {
        let toggle = if enforcement { "on" } else { "off" };
        self.boxed(
            "Main menu",
            &[
                "1. Automatic acquisition".to_string(),
                "2. Manual action".to_string(),
                "3. Compress output folder".to_string(),
                format!("4. Toggle network enforcement (now {})", toggle),
                "0. Exit".to_string(),
            ],
        )?;
        self.ask("Select an option:", parse_menu_choice)
    }

    pub fn action_menu(&self) -> io::Result<Option<ActionId>> {
        let mut lines: Vec<String> = ActionId::ALL
            .iter()
            .enumerate()
            .map(|(i, id)| format!("{}. {}", i + 1, id.title()))
            .collect();
        lines.push("0. Back".to_string());
        self.boxed("Manual acquisition", &lines)?;
        self.ask("Select an action:", parse_action_choice)
    }

    pub fn format_menu(&self) -> io::Result<BundleFormat> {
        self.ask("Compression format [1] zip [2] tar [3] tar.gz:", parse_format_choice)
    }

    /// Free-text answer; blank lines re-prompt unless `optional`.
    pub fn prompt(&self, question: &str, optional: bool) -> io::Result<Option<String>> {
        self.ask(question, |answer| {
            let answer = answer.trim();
            match (answer.is_empty(), optional) {
                (true, true) => Some(None),
                (true, false) => None,
                (false, _) => Some(Some(answer.to_string())),
            }
        })
    }

    pub fn confirm(&self, question: &str) -> io::Result<bool> {
        self.ask(&format!("{} [y/n]", question), |answer| {
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => Some(true),
                "n" | "no" => Some(false),
                _ => None,
            }
        })
    }

    pub fn notice(&self, message: &str) -> io::Result<()> {
        self.term.write_line(&format!("    {} {}", style("▶").blue(), message))
    }
}

/// One line per action result, to stdout.
pub fn print_action_result(id: ActionId, result: &AcqResult<ActionOutcome>) {
    match result {
        Ok(outcome) => {
            println!(
                "    {} {} {}",
                style("✓").green().bold(),
                style(id.title()).white().bold(),
                style(&outcome.summary).dim()
            );
            for artifact in &outcome.artifacts {
                println!("      {} {}", style("├─").dim(), artifact.display());
            }
        }
        Err(e) => println!(
            "    {} {} {}",
            style("✗").red().bold(),
            style(id.title()).white().bold(),
            style(e).red()
        ),
    }
}

pub fn print_bundle(bundle: &Bundle) {
    println!(
        "    {} Bundle written: {}",
        style("✓").green().bold(),
        style(bundle.path.display()).white().bold()
    );
    println!("      {} {} files", style("├─").dim(), bundle.entries);
    println!("      {} sha256 {}", style("└─").dim(), bundle.sha256);
}
