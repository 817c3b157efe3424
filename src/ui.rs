use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
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

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a boolean flag as a colored yes/no
pub fn flag(key: &str, value: bool) {
    let shown = if value { "yes".green() } else { "no".yellow() };
    println!("  {}: {}", key.dimmed(), shown);
}

/// Print the keys of connection details without their values
pub fn secrets(keys: impl IntoIterator<Item = impl AsRef<str>>) {
    let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
    if keys.is_empty() {
        kv("connection details", &"none".dimmed().to_string());
    } else {
        kv("connection details", &keys.join(", "));
    }
}
