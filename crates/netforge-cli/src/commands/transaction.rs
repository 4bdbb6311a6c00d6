//! Transaction commands
//!
//! Usage:
//!   netforge commit -m "msg" [--confirm <secs>] [--timeout <secs>]
//!   netforge confirm
//!   netforge rollback

use clap::Args;
use netforge_core::errors::Result;
use netforge_engine::{Engine, TxState};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct CommitArgs {
    /// Commit message recorded in the snapshot
    #[arg(short, long)]
    pub message: String,

    /// Seconds to wait for confirmation before auto-rollback (0 = none)
    #[arg(long, default_value_t = 0)]
    pub confirm: u64,

    /// Overall transaction timeout in seconds (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,
}

pub fn commit(engine: &Engine, args: CommitArgs) -> Result<()> {
    engine.commit(
        &args.message,
        Duration::from_secs(args.confirm),
        Duration::from_secs(args.timeout),
    )?;

    if engine.state() == TxState::Pending {
        // The confirm timer lives in this process, so the command stays in
        // the foreground for the length of the window.
        println!(
            "Changes applied; press Enter within {}s to confirm, or they will be rolled back",
            args.confirm
        );

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_ok() {
                let _ = tx.send(());
            }
        });

        match rx.recv_timeout(Duration::from_secs(args.confirm)) {
            Ok(()) => {
                engine.confirm()?;
                println!("Transaction confirmed");
            }
            Err(_) => {
                // Wait for the auto-rollback to finish before exiting
                engine.close();
                println!("Confirmation window expired; changes rolled back");
            }
        }
    } else {
        println!("Transaction completed");
    }
    Ok(())
}

pub fn confirm(engine: &Engine) -> Result<()> {
    engine.confirm()?;
    println!("Transaction confirmed");
    Ok(())
}

pub fn rollback(engine: &Engine) -> Result<()> {
    engine.rollback()?;
    println!("Rollback completed");
    Ok(())
}
