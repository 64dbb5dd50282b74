//! Output formatting for CI logs.
//!
//! Log output follows the CI annotation protocol (`::group::`,
//! `::endgroup::`, `::warning::`, `::error::`) so the runner folds phases
//! and highlights problems, with `colored` styling for humans tailing the
//! same stream.

use colored::Colorize;

/// Open a collapsible log group.
pub fn group(name: &str) {
    println!("::group::{name}");
}

/// Close the current log group.
pub fn end_group() {
    println!("::endgroup::");
}

/// Emit a warning annotation (always shown, highlighted by the runner).
pub fn warning(message: &str) {
    println!("::warning::{message}");
}

/// Emit an error annotation.
pub fn error(message: &str) {
    println!("::error::{message}");
}

/// Print an informational status line.
pub fn info(message: &str) {
    println!("{}", message.dimmed());
}

/// Print a success line in green.
pub fn success(message: &str) {
    println!("{}", message.green());
}

/// Print a git-style action line with a dimmed verb.
pub fn action(verb: &str, message: &str) {
    println!("{} {}", verb.dimmed().bold(), message);
}
