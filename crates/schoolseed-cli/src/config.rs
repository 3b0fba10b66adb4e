use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use schoolseed_generate::GenerateOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Contents of `schoolseed.toml`.
///
/// ```toml
/// database_url = "postgres://seeder@localhost/school"
/// bootstrap_url = "http://localhost:8000/register_testing_users"
///
/// [generation]
/// seed = 7
/// teachers = 20
///
/// [generation.fixtures.layout]
/// years = 12
/// divisions = 3
/// primary_limit = 7
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub bootstrap_url: Option<String>,
    pub generation: GenerateOptions,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub bootstrap_url: Option<String>,
    pub seed: Option<u64>,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub bootstrap_url: Option<String>,
    pub options: GenerateOptions,
}

impl Settings {
    /// Flags first, then the file, then `env_database_url`.
    pub fn resolve(
        file: FileConfig,
        overrides: Overrides,
        env_database_url: Option<String>,
    ) -> Self {
        let FileConfig {
            database_url,
            bootstrap_url,
            generation: mut options,
        } = file;

        if let Some(seed) = overrides.seed {
            options.seed = seed;
        }

        Self {
            database_url: overrides
                .database_url
                .or(database_url)
                .or(env_database_url),
            bootstrap_url: overrides.bootstrap_url.or(bootstrap_url),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolseed_core::ShiftPolicy;

    #[test]
    fn file_values_fill_generation_options() {
        let file = FileConfig::parse(
            r#"
            database_url = "postgres://file@localhost/school"

            [generation]
            seed = 9
            teachers = 3
            shift_policy = "fixed"

            [generation.layout]
            years = 5
            divisions = 2
            primary_limit = 3

            [generation.fixtures.layout]
            years = 6
            divisions = 3
            primary_limit = 4
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(file, Overrides::default(), None);
        assert_eq!(settings.database_url.as_deref(), Some("postgres://file@localhost/school"));
        assert_eq!(settings.options.seed, 9);
        assert_eq!(settings.options.teachers, 3);
        assert_eq!(settings.options.shift_policy, ShiftPolicy::Fixed);
        assert_eq!(settings.options.layout.years, 5);
        assert_eq!(settings.options.fixtures.layout.years, 6);
        // Untouched keys keep their defaults.
        assert_eq!(settings.options.preceptors, 7);
    }

    #[test]
    fn flags_beat_file_and_environment() {
        let file = FileConfig::parse("database_url = \"postgres://file/school\"").unwrap();
        let overrides = Overrides {
            database_url: Some("postgres://flag/school".to_string()),
            bootstrap_url: None,
            seed: Some(3),
        };
        let settings =
            Settings::resolve(file, overrides, Some("postgres://env/school".to_string()));
        assert_eq!(settings.database_url.as_deref(), Some("postgres://flag/school"));
        assert_eq!(settings.options.seed, 3);
    }

    #[test]
    fn environment_is_the_last_fallback() {
        let settings = Settings::resolve(
            FileConfig::default(),
            Overrides::default(),
            Some("postgres://env/school".to_string()),
        );
        assert_eq!(settings.database_url.as_deref(), Some("postgres://env/school"));
        assert_eq!(settings.options.seed, GenerateOptions::default().seed);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FileConfig::parse("databse_url = \"typo\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_generation_keys_are_rejected() {
        for text in [
            "[generation]\nteacher = 3",
            "[generation.layout]\nyears = 5\ndivisions = 2\nprimary_limit = 3\ngrades = 1",
            "[generation.fixtures]\nyears = 6",
            // Fixtures are configured under `[generation]` only.
            "[fixtures.layout]\nyears = 6\ndivisions = 3\nprimary_limit = 4",
        ] {
            assert!(
                matches!(FileConfig::parse(text), Err(ConfigError::Toml(_))),
                "{text}"
            );
        }
    }
}
