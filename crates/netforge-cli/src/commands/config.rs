//! Config read/write commands
//!
//! Usage:
//!   netforge show <name>
//!   netforge get <config.section.option>
//!   netforge set <config.section.option> <value>
//!   netforge changes
//!   netforge revert

use netforge_core::errors::Result;
use netforge_engine::Engine;

pub fn show(engine: &Engine, name: &str) -> Result<()> {
    print!("{}", engine.show(name)?);
    Ok(())
}

pub fn get(engine: &Engine, path: &str) -> Result<()> {
    println!("{}", engine.get(path)?);
    Ok(())
}

pub fn set(engine: &Engine, path: &str, value: &str) -> Result<()> {
    engine.set(path, value)?;
    println!("Staged {path}");
    Ok(())
}

pub fn changes(engine: &Engine) -> Result<()> {
    let changed = engine.changes();
    if changed.is_empty() {
        println!("No staged changes");
    } else {
        for name in changed {
            println!("{name}");
        }
    }
    Ok(())
}

pub fn revert(engine: &Engine) -> Result<()> {
    engine.revert();
    println!("Staged changes dropped");
    Ok(())
}
