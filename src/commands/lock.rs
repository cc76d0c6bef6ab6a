//! Implementation of the `smcore lock` commands.

use crate::cli::{LockArgs, LockCommand, LockHoldArgs, NamespaceArgs};
use smcore::context::SmContext;
use smcore::error::{Result, SmError};
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

pub fn dispatch(ctx: &SmContext, command: LockCommand) -> Result<()> {
    match command {
        LockCommand::Test(args) => cmd_test(ctx, args),
        LockCommand::Hold(args) => cmd_hold(ctx, args),
        LockCommand::Cleanup(args) => cmd_cleanup(ctx, args),
        LockCommand::CleanupAll(args) => cmd_cleanup_all(ctx, args),
        LockCommand::List(args) => cmd_list(ctx, args),
    }
}

fn cmd_test(ctx: &SmContext, args: LockArgs) -> Result<()> {
    let lock = ctx.locks().lock(&args.name, args.namespace.as_deref())?;
    match lock.test()? {
        Some(pid) => println!("{}", pid),
        None => println!("unheld"),
    }
    Ok(())
}

/// Hold a lock from a separate process; used to probe cross-process
/// exclusion by hand and from tests.
fn cmd_hold(ctx: &SmContext, args: LockHoldArgs) -> Result<()> {
    let namespace = args.lock.namespace.as_deref();
    let guard = if args.no_wait {
        ctx.locks().acquire_or_fail(&args.lock.name, namespace)?
    } else {
        ctx.locks().acquire(&args.lock.name, namespace)?
    };

    let mut stdout = io::stdout();
    writeln!(stdout, "acquired {}", std::process::id())
        .and_then(|()| stdout.flush())
        .map_err(|e| SmError::io("failed to write to stdout", e))?;

    match args.seconds {
        Some(seconds) => thread::sleep(Duration::from_secs(seconds)),
        None => {
            let mut sink = Vec::new();
            io::stdin()
                .read_to_end(&mut sink)
                .map_err(|e| SmError::io("failed to read stdin", e))?;
        }
    }

    guard.release()
}

fn cmd_cleanup(ctx: &SmContext, args: LockArgs) -> Result<()> {
    ctx.locks().cleanup(&args.name, args.namespace.as_deref())?;
    println!("Removed lock {}", args.name);
    Ok(())
}

fn cmd_cleanup_all(ctx: &SmContext, args: NamespaceArgs) -> Result<()> {
    ctx.locks().cleanup_all(args.namespace.as_deref())?;
    println!(
        "Removed all locks in {}",
        args.namespace.as_deref().unwrap_or("the nil namespace")
    );
    Ok(())
}

fn cmd_list(ctx: &SmContext, args: NamespaceArgs) -> Result<()> {
    let locks = ctx.locks().list(args.namespace.as_deref())?;

    if locks.is_empty() {
        println!("No locks.");
        return Ok(());
    }

    for lock in &locks {
        println!("  {}", lock);
        println!("    Path:       {}", lock.path.display());
    }
    Ok(())
}
