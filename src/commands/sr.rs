//! Implementation of the `smcore sr` commands.

use crate::cli::{SrArgs, SrChainArgs, SrCommand};
use smcore::context::SmContext;
use smcore::error::Result;

pub fn dispatch(ctx: &SmContext, command: SrCommand) -> Result<()> {
    match command {
        SrCommand::Recover(args) => cmd_recover(ctx, args),
        SrCommand::Gc(args) => cmd_gc(ctx, args),
        SrCommand::Chain(args) => cmd_chain(ctx, args),
    }
}

fn cmd_recover(ctx: &SmContext, args: SrArgs) -> Result<()> {
    let report = ctx.volume_manager(&args.sr)?.recover()?;

    if report.is_empty() {
        println!("Nothing to recover in SR {}.", args.sr);
        return Ok(());
    }

    for vdi in &report.inflates_undone {
        println!("  undid resize of {}", vdi);
    }
    for vdi in &report.clones_undone {
        println!("  undid snapshot of {}", vdi);
    }
    for node in &report.coalesces_finished {
        println!("  finished coalesce of {}", node);
    }
    Ok(())
}

fn cmd_gc(ctx: &SmContext, args: SrArgs) -> Result<()> {
    let report = ctx.volume_manager(&args.sr)?.garbage_collect()?;

    if report.skipped {
        println!("GC already running in SR {}.", args.sr);
        return Ok(());
    }

    println!(
        "Removed {} and coalesced {} volume(s) in SR {}.",
        report.removed.len(),
        report.coalesced.len(),
        args.sr
    );
    Ok(())
}

fn cmd_chain(ctx: &SmContext, args: SrChainArgs) -> Result<()> {
    let chain = ctx.volume_manager(&args.sr)?.chain(&args.vdi)?;

    for info in &chain {
        let mut flags = Vec::new();
        if info.hidden {
            flags.push("hidden");
        }
        if info.active {
            flags.push("active");
        }
        println!("{} {} [{}]", info.name, info.size, flags.join(","));
    }
    Ok(())
}
