use colored::{ColoredString, Colorize};
use declarative::{BindingStatus, EntryStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Glyph for a report entry status
pub fn entry_glyph(status: EntryStatus) -> ColoredString {
    match status {
        EntryStatus::Created => "+".green(),
        EntryStatus::Deleted => "-".green(),
        EntryStatus::Failed => "✗".red(),
        EntryStatus::Skipped => "○".yellow(),
    }
}

/// Glyph for a binding status
pub fn binding_glyph(status: BindingStatus) -> ColoredString {
    match status {
        BindingStatus::Applied => "→".green(),
        BindingStatus::Failed => "✗".red(),
        BindingStatus::Skipped => "○".yellow(),
    }
}

/// "1 node" / "3 nodes"
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
