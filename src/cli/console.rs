use colored::*;
use std::io::{self, Write};

use crate::core::Tristate;
use crate::sender::Sender;

/// Console handles all operator terminal I/O with colored formatting
pub struct Console {
    prompt_color: Color,
    reply_color: Color,
    sender_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            prompt_color: Color::Cyan,
            reply_color: Color::Green,
            sender_color: Color::Magenta,
        }
    }

    /// Print a reply line from a command
    pub fn print_reply(&self, message: &str) {
        println!("{}", message.color(self.reply_color));
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Print a permission-denied notice for a sender
    pub fn print_denied(&self, sender: &Sender, node: &str) {
        println!(
            "{} {} lacks {}",
            "Permission denied:".red().bold(),
            sender.display_name().color(self.sender_color),
            node.bright_black()
        );
    }

    /// Print the outcome of a permission check
    pub fn print_check(&self, sender: &Sender, node: &str, value: Tristate) {
        let value_str = match value {
            Tristate::True => "true".green().bold(),
            Tristate::False => "false".red().bold(),
            Tristate::Undefined => "undefined".bright_black().bold(),
        };
        println!(
            "{} {} {} {}",
            sender.display_name().color(self.sender_color),
            node,
            "=>".bright_black(),
            value_str
        );
    }

    /// Read a line of input from the operator
    ///
    /// Returns `None` at end of input.
    pub fn read_input(&self) -> io::Result<Option<String>> {
        print!("{} ", ">".color(self.prompt_color).bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }

    /// Print a welcome banner
    pub fn print_banner(&self) {
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "  Permission Bridge - Operator Console".bright_blue().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!("Type 'help' for commands. Type 'exit' or 'quit' to stop.");
        println!();
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
