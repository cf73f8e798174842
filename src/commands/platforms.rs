//! The `platforms` command: list the built-in platform registry.

use crate::platform::supported_platforms;

pub fn run_platforms_command() {
    for platform in supported_platforms() {
        println!(
            "{}\t{}\t{}",
            platform.id,
            platform.name,
            platform.match_hosts.join(", ")
        );
    }
}
