//! Terminal output for agent runs

use colored::Colorize;
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

use iagent_core::{AgentEvent, AgentRunResult};

const RULE_WIDTH: usize = 60;
pub const ANSWER_WIDTH: usize = 80;

pub fn print_mode_banner(execute: bool) {
    if execute {
        println!(
            "{}",
            "EXECUTION MODE: Code will be executed locally".yellow().bold()
        );
    } else {
        println!(
            "{}",
            "SAFE MODE: Code will be previewed only (use --execute to run code)".green()
        );
    }
}

pub fn print_thinking() {
    println!("iagent is thinking...\n");
}

/// Print one live event; the final answer is printed separately
pub fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Stream { content } => {
            print!("{}", content);
            let _ = io::stdout().flush();
        }
        AgentEvent::CodeOutput { content } => {
            println!("\n{} {}", "[code]".cyan().bold(), content);
        }
        AgentEvent::ToolResult { tool, result } => {
            println!("\n{} {}: {}", "[tool]".blue().bold(), tool.bold(), result);
        }
        AgentEvent::Error { content } => {
            println!("\n{} {}", "[error]".red().bold(), content);
        }
        AgentEvent::Final { .. } => {}
    }
}

pub fn print_result(result: &AgentRunResult, max_steps: usize) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n\n{}", "Final Answer:".bold());
    println!("{}", rule);
    println!("{}", AnswerFormatter::new(ANSWER_WIDTH).format(&result.answer));
    println!("{}", rule);
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
    println!("Steps: {}", result.step_count());
    if !result.is_final_answer() {
        println!(
            "{}",
            format!(
                "Note: step budget of {} exhausted before a final answer; showing the last model output.",
                max_steps
            )
            .yellow()
        );
    }
}

/// Lays out a final answer for the terminal
///
/// Whitespace runs collapse to single spaces. Numbered items (`1.`, `2.`, ...
/// in ascending order, each starting a word) go on their own lines separated
/// by blank lines. Everything is wrapped at `width` display columns.
pub struct AnswerFormatter {
    width: usize,
}

impl AnswerFormatter {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(20) }
    }

    pub fn format(&self, answer: &str) -> String {
        let words: Vec<&str> = answer.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }

        let mut intro: Vec<&str> = Vec::new();
        let mut items: Vec<Vec<&str>> = Vec::new();
        let mut next_number = 1;

        for word in words {
            if word == format!("{}.", next_number) {
                items.push(vec![word]);
                next_number += 1;
            } else if let Some(item) = items.last_mut() {
                item.push(word);
            } else {
                intro.push(word);
            }
        }

        // A lone "1." is an ordinary sentence ending, not a list
        if items.len() == 1 {
            let mut all = intro;
            all.extend(items.remove(0));
            return self.wrap(&all, 0);
        }

        let mut blocks = Vec::new();
        if !intro.is_empty() {
            blocks.push(self.wrap(&intro, 0));
        }
        for item in &items {
            let indent = item[0].width() + 1;
            blocks.push(self.wrap(item, indent));
        }
        blocks.join("\n\n")
    }

    /// Greedy wrap; continuation lines are indented by `indent` columns
    fn wrap(&self, words: &[&str], indent: usize) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut line = String::new();
        let mut line_width = 0;
        let mut at_line_start = true;

        for word in words {
            let word_width = word.width();
            if !at_line_start && line_width + 1 + word_width > self.width {
                lines.push(std::mem::take(&mut line));
                line.push_str(&" ".repeat(indent));
                line_width = indent;
                at_line_start = true;
            }
            if !at_line_start {
                line.push(' ');
                line_width += 1;
            }
            line.push_str(word);
            line_width += word_width;
            at_line_start = false;
        }
        lines.push(line);
        lines.join("\n")
    }
}
