//! Terminal output and prompts.
//!
//! Regular output goes to stdout, errors to stderr. Prompts use dialoguer on
//! a terminal and fall back to reading plain lines from stdin otherwise, so
//! answers can be piped in.

use anyhow::Result;
use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Input, Password};
use std::fmt::Display;
use std::io::{BufRead, IsTerminal, Write};

pub fn say(message: impl Display) {
    println!("{message}");
}

pub fn say_green(message: impl Display) {
    println!("{}", style(message).green());
}

pub fn say_error(message: impl Display) {
    eprintln!("{}", style(message).red());
}

pub fn say_new_line() {
    println!();
}

/// Two columns, the first padded to its widest cell.
pub fn format_table(rows: &[(String, String)], indent: usize) -> Vec<String> {
    let width = rows
        .iter()
        .map(|(left, _)| left.chars().count())
        .max()
        .unwrap_or(0);

    rows.iter()
        .map(|(left, right)| {
            format!("{:indent$}{:<width$}  {}", "", left, right)
                .trim_end()
                .to_string()
        })
        .collect()
}

pub fn print_table(rows: &[(String, String)], indent: usize) {
    for line in format_table(rows, indent) {
        say(line);
    }
}

fn interactive() -> bool {
    std::io::stdin().is_terminal() && Term::stdout().is_term()
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt} ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        anyhow::bail!("No answer given to: {prompt}");
    }
    Ok(line.trim().to_string())
}

/// Ask for a line of text. An empty answer is returned as-is.
pub fn ask(prompt: &str) -> Result<String> {
    if !interactive() {
        return read_line(prompt);
    }

    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(answer.trim().to_string())
}

pub fn ask_password(prompt: &str) -> Result<String> {
    if !interactive() {
        return read_line(prompt);
    }

    Ok(Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?)
}

/// True when the answer is `y` or `yes`.
pub fn yes(prompt: &str) -> Result<bool> {
    Ok(is_yes(&ask(prompt)?))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Download progress on stderr, shown only on a terminal.
pub struct Progress {
    term: Term,
    total: u64,
    done: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            term: Term::stderr(),
            total,
            done: 0,
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.done += bytes;
        if !self.term.is_term() {
            return;
        }
        let line = match self.done.saturating_mul(100).checked_div(self.total) {
            Some(percent) => format!("Progress: {}%", percent.min(100)),
            None => format!("Progress: {} bytes", self.done),
        };
        let _ = self.term.clear_line();
        let _ = self.term.write_str(&line);
    }

    pub fn finish(&self) {
        if self.term.is_term() {
            let _ = self.term.write_line("");
        }
    }
}
