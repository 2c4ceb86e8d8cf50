//! `pathbridge canonical`: Print the canonical mount form of host paths.

use clap::Args;
use pathbridge_core::path::{detect_dialect, to_canonical};

/// Arguments for the `canonical` command.
#[derive(Args, Debug)]
pub struct CanonicalArgs {
    /// Host paths in any supported dialect.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Also print the detected dialect of each input.
    #[arg(long)]
    pub dialect: bool,
}

/// Executes the `canonical` command.
///
/// Every path is processed; rejected paths are reported on stderr.
///
/// # Errors
///
/// Returns an error if any path was rejected.
pub fn execute(args: &CanonicalArgs) -> anyhow::Result<()> {
    let mut rejected = 0_usize;
    for path in &args.paths {
        match to_canonical(path) {
            Ok(canonical) if args.dialect => println!("{canonical}\t{}", detect_dialect(path)),
            Ok(canonical) => println!("{canonical}"),
            Err(e) => {
                tracing::error!(error = %e, "path rejected");
                rejected += 1;
            }
        }
    }

    if rejected > 0 {
        anyhow::bail!("{rejected} of {} path(s) rejected", args.paths.len());
    }
    Ok(())
}
