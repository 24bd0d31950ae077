//! List commands implementation

use segchain_registry::available_transports;

/// List all transports compiled into this binary
pub fn list_transports() {
    println!("Available transports:");
    println!();

    for info in available_transports() {
        let aliases = if info.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", info.aliases.join(", "))
        };
        println!("  {:<10} - {}{}", info.name, info.description, aliases);
    }

    println!();
    println!("Usage: segchain -t <name>[:key=value,...] <command>");
}
