//! List known target OS names.

use std::process::ExitCode;
use wheelhouse_lib::target::OS_PLATFORMS;

/// Print the OS table.
pub fn cmd_targets() -> ExitCode {
    println!("Known OS names:");
    for (os, platforms) in OS_PLATFORMS {
        println!("  {:<30} {}", os, platforms.join(", "));
    }
    println!();
    println!("Any other name is used as a literal platform tag.");
    ExitCode::SUCCESS
}
