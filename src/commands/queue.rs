//! Implementation of the `smcore queue` commands.

use crate::cli::QueueCommand;
use smcore::context::SmContext;
use smcore::error::Result;

pub fn dispatch(ctx: &SmContext, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::Show(args) => {
            let queue = ctx.lock_queue(&args.name)?;
            let waiters = queue.waiters()?;

            if waiters.is_empty() {
                println!("Queue {} is empty.", args.name);
                return Ok(());
            }

            println!("Queue {} ({} waiting):", args.name, waiters.len());
            for waiter in &waiters {
                println!(
                    "  pid {:<8} start {:<12} queued {}",
                    waiter.pid,
                    waiter.start_time,
                    waiter.queued_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Ok(())
        }
    }
}
