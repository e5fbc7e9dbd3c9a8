//! Command: print version information.

/// Version string embedded at build time, falling back to the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("TELEGRAF_CONF_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the telegraf-conf version to stdout.
pub fn run() {
    println!("telegraf-conf {}", version());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
