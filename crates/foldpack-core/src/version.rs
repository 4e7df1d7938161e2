/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns a formatted version string.
#[must_use]
pub fn version_string() -> String {
    format!("foldpack {VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_contains_version() {
        let vs = version_string();
        assert!(vs.contains(VERSION));
        assert!(vs.starts_with("foldpack "));
    }
}
