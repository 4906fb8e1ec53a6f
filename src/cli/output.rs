//! Terminal output for the CLI.
//!
//! Diagnostics go to stderr, data goes to stdout uncolored so it can be piped.
//! `colored` honours NO_COLOR and CLICOLOR_FORCE.

use std::fmt::Display;

use colored::Colorize;

pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "warning".yellow(), msg);
}

/// Validation verdict: green check when `ok`, red cross otherwise.
pub fn verdict(ok: bool, msg: &(impl Display + ?Sized)) {
    if ok {
        println!("{} {}", "✓".green(), msg);
    } else {
        println!("{} {}", "✗".red(), msg);
    }
}

/// Comment line above a data block.
pub fn header(msg: &(impl Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Secondary note, indented under the previous line.
pub fn note(msg: &(impl Display + ?Sized)) {
    println!("  {}", msg.to_string().dimmed());
}

/// Raw data line.
pub fn data(msg: &(impl Display + ?Sized)) {
    println!("{}", msg);
}
