//! Implementation of the `smcore journal` commands.

use crate::cli::{JournalCommand, JournalKeyArgs, JournalListArgs};
use smcore::context::SmContext;
use smcore::error::{Result, SmError};
use smcore::journal::Journaler;

pub fn dispatch(ctx: &SmContext, command: JournalCommand) -> Result<()> {
    match command {
        JournalCommand::List(args) => cmd_list(ctx, args),
        JournalCommand::Get(args) => cmd_get(ctx, args),
        JournalCommand::Remove(args) => cmd_remove(ctx, args),
    }
}

fn cmd_list(ctx: &SmContext, args: JournalListArgs) -> Result<()> {
    let journal = ctx.journaler(args.sr.as_deref());
    let entries = journal.get_all(&args.kind)?;

    if entries.is_empty() {
        println!("No {} journals.", args.kind);
        return Ok(());
    }

    for (id, value) in &entries {
        println!("{} {}", id, value);
    }
    Ok(())
}

fn cmd_get(ctx: &SmContext, args: JournalKeyArgs) -> Result<()> {
    let journal = ctx.journaler(args.sr.as_deref());
    let value = journal.get(&args.kind, &args.id)?.ok_or_else(|| {
        SmError::NotFound(format!("journal '{}:{}'", args.kind, args.id))
    })?;
    println!("{}", value);
    Ok(())
}

fn cmd_remove(ctx: &SmContext, args: JournalKeyArgs) -> Result<()> {
    let journal = ctx.journaler(args.sr.as_deref());
    journal.remove(&args.kind, &args.id)?;
    log::warn!("journal {}:{} removed by hand", args.kind, args.id);
    println!("Removed journal {}:{}", args.kind, args.id);
    Ok(())
}
