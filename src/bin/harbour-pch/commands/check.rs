//! `harbour-pch check` command

use anyhow::Result;

use crate::cli::CheckArgs;
use harbour_pch::ops::check;
use harbour_pch::util::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: CheckArgs) -> Result<()> {
    let manifest_path = super::manifest_path(ctx, args.manifest_path);

    let report = check(&manifest_path)?;
    print!("{}", report.format(ctx.color(), ctx.is_verbose()));

    if !report.is_ok() {
        std::process::exit(1);
    }

    Ok(())
}
