//! Single-applier entry point used by service-manager integration
//!
//! Usage:
//!   netforge apply <network|firewall|dhcp>

use netforge_core::errors::Result;
use netforge_engine::Engine;

pub fn execute(engine: &Engine, name: &str) -> Result<()> {
    engine.apply(name)?;
    println!("Applied {name}");
    Ok(())
}
