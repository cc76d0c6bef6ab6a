//! Implementation of the `smcore refcount` commands.

use crate::cli::{RefcountArgs, RefcountCommand};
use smcore::context::SmContext;
use smcore::error::Result;

pub fn dispatch(ctx: &SmContext, command: RefcountCommand) -> Result<()> {
    let refcounter = ctx.refcounter();
    match command {
        RefcountCommand::Show(RefcountArgs { object, namespace }) => {
            println!("{}", refcounter.check(&object, &namespace)?);
            Ok(())
        }
        RefcountCommand::Reset(RefcountArgs { object, namespace }) => {
            refcounter.reset(&object, &namespace)?;
            println!("Reset refcount of {} in {}", object, namespace);
            Ok(())
        }
    }
}
