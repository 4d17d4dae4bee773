use std::path::Path;

use anyhow::{Context, Result};
use flow_guardian::GuardianConfig;

/// Load the guardian config: TOML file if given, otherwise defaults, with
/// `GUARDIAN_*` environment overrides applied on top either way.
pub fn load(path: Option<&Path>) -> Result<GuardianConfig> {
    let mut config = match path {
        Some(path) => GuardianConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load guardian config from {}", path.display()))?,
        None => GuardianConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    config
        .validate()
        .context("Guardian config invalid after environment overrides")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rate_limit = 7\nsupport_contact = \"ops@example.com\"").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.rate_limit, 7);
        assert_eq!(config.support_contact, "ops@example.com");
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load(Some(Path::new("/nonexistent/guardian.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/guardian.toml"));
    }
}
