//! Line parser for the interactive prompt.

/// One action typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Product { url: String },
    Order { tracking_number: String, contact_email: String },
    Check,
    List,
    Remove { key: String },
    Clear,
    Help,
    Quit,
}

/// Parse one prompt line. The verb is case-insensitive; arguments are
/// taken verbatim.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err("Type 'help' for the command list.".to_string());
    };
    let rest: Vec<&str> = parts.collect();

    match verb.to_lowercase().as_str() {
        "product" | "p" => match rest.as_slice() {
            [url] => Ok(Command::Product {
                url: (*url).to_string(),
            }),
            _ => Err("Usage: product <url>".to_string()),
        },
        "order" | "o" => match rest.as_slice() {
            [tracking_number, contact_email] => Ok(Command::Order {
                tracking_number: (*tracking_number).to_string(),
                contact_email: (*contact_email).to_string(),
            }),
            _ => Err("Usage: order <tracking-number> <email>".to_string()),
        },
        "check" | "c" => Ok(Command::Check),
        "list" | "ls" => Ok(Command::List),
        "remove" | "rm" => match rest.as_slice() {
            [key] => Ok(Command::Remove {
                key: (*key).to_string(),
            }),
            _ => Err("Usage: remove <url-or-tracking-number>".to_string()),
        },
        "clear" | "cls" => Ok(Command::Clear),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!(
            "Unknown command: {other}. Type 'help' for the command list."
        )),
    }
}
