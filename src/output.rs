//! User-facing messages.
//! stdout carries only the JSON result line of a command; every other message goes to
//! stderr, colored when stderr is a TTY.
use owo_colors::OwoColorize;
use serde::Serialize;

fn is_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "info:".cyan().bold(), msg);
    } else {
        eprintln!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "ok:".green().bold(), msg);
    } else {
        eprintln!("ok: {}", msg);
    }
}

/// Print the machine-readable result of a command as one JSON line on stdout.
pub fn print_result<T: Serialize>(result: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}
