//! Registered type listing.

use tabport::models::Direction;
use tabport::{Result, TabportConfig};

use super::open_registry;

/// Executes the types command.
pub fn cmd_types(config: &TabportConfig) -> Result<()> {
    let registry = open_registry(config)?;

    for direction in [Direction::Import, Direction::Export] {
        let types = registry.types(direction);
        if types.is_empty() {
            println!("{direction}: (none)");
            continue;
        }
        println!("{direction}:");
        for type_name in types {
            let headers = registry
                .resolve(type_name, direction)
                .map(|capability| capability.headers().join(","))?;
            println!("  {type_name:<16} {headers}");
        }
    }

    Ok(())
}
