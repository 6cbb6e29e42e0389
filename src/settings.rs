use std::path::{Path, PathBuf};
use std::time::Duration;

use pageguard_lib::browser::BrowserOptions;
use pageguard_lib::{Config, GuardError, Viewport};
use tracing::debug;

/// Compare flags that override config values when given.
#[derive(Debug, Default)]
pub struct CompareOverrides {
    pub delays: Option<Vec<i64>>,
    pub viewport: Option<Viewport>,
    pub artifacts_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub nav_timeout_secs: Option<u64>,
    pub no_overlay: bool,
}

/// Resolved settings after merging CLI args and config file.
#[derive(Debug, Clone)]
pub struct ResolvedCompareSettings {
    pub viewport: Viewport,
    pub delays: Vec<i64>,
    pub artifacts_dir: PathBuf,
    pub database: PathBuf,
    pub overlay: bool,
    pub browser: BrowserOptions,
    pub capture_grace: Duration,
}

/// Merge CLI arguments with config file, preferring CLI when flags are present.
pub fn resolve_compare_settings(
    overrides: CompareOverrides,
    config: &Config,
) -> Result<ResolvedCompareSettings, GuardError> {
    let navigation_timeout = match overrides.nav_timeout_secs {
        Some(0) => {
            return Err(GuardError::Config(
                "--nav-timeout must be greater than zero".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => config.timeouts.navigation,
    };

    Ok(ResolvedCompareSettings {
        viewport: overrides.viewport.unwrap_or(config.viewport),
        delays: overrides.delays.unwrap_or_else(|| config.delays.clone()),
        artifacts_dir: overrides
            .artifacts_dir
            .unwrap_or_else(|| config.artifacts_dir.clone()),
        database: overrides
            .database
            .unwrap_or_else(|| config.database.clone()),
        overlay: config.overlay && !overrides.no_overlay,
        browser: BrowserOptions {
            node_command: config.browser.node_command.clone(),
            headless: config.browser.headless,
            navigation_timeout,
            html_limit: config.html_limit,
        },
        capture_grace: config.timeouts.capture_grace,
    })
}

/// Database path for the read-only commands.
pub fn resolve_database(cli_db: Option<PathBuf>, config: &Config) -> PathBuf {
    cli_db.unwrap_or_else(|| config.database.clone())
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/pageguard/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, GuardError> {
    let cfg = Config::load(path)?;
    cfg.validate().map_err(|e| {
        let detail = match e {
            GuardError::Config(msg) => msg,
            other => other.to_string(),
        };
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), detail))
            .unwrap_or_else(|| format!("Invalid config: {}", detail));
        GuardError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Log the effective compare settings (visible with --verbose).
pub fn log_effective_config(config_path: Option<&Path>, settings: &ResolvedCompareSettings) {
    let config_source = config_path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "defaults/built-in".to_string());
    debug!(
        source = %config_source,
        viewport = %settings.viewport,
        delays = ?settings.delays,
        artifacts_dir = %settings.artifacts_dir.display(),
        database = %settings.database.display(),
        overlay = settings.overlay,
        nav_timeout = ?settings.browser.navigation_timeout,
        capture_grace = ?settings.capture_grace,
        node = %settings.browser.node_command,
        headless = settings.browser.headless,
        "effective config"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_apply_without_flags() {
        let config = Config {
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            delays: vec![1500],
            ..Config::default()
        };
        let resolved = resolve_compare_settings(CompareOverrides::default(), &config).unwrap();
        assert_eq!(resolved.viewport.width, 1280);
        assert_eq!(resolved.delays, vec![1500]);
        assert!(resolved.overlay);
        assert_eq!(resolved.browser.navigation_timeout, Duration::from_secs(60));
    }

    #[test]
    fn flags_override_config() {
        let config = Config {
            delays: vec![1500],
            ..Config::default()
        };
        let resolved = resolve_compare_settings(
            CompareOverrides {
                delays: Some(vec![500, 1000]),
                viewport: Some(Viewport {
                    width: 375,
                    height: 812,
                }),
                artifacts_dir: Some(PathBuf::from("shots")),
                database: Some(PathBuf::from("r.db")),
                nav_timeout_secs: Some(10),
                no_overlay: true,
            },
            &config,
        )
        .unwrap();
        assert_eq!(resolved.delays, vec![500, 1000]);
        assert_eq!(resolved.viewport.height, 812);
        assert_eq!(resolved.artifacts_dir, PathBuf::from("shots"));
        assert_eq!(resolved.database, PathBuf::from("r.db"));
        assert_eq!(resolved.browser.navigation_timeout, Duration::from_secs(10));
        assert!(!resolved.overlay);
    }

    #[test]
    fn zero_nav_timeout_flag_is_rejected() {
        let err = resolve_compare_settings(
            CompareOverrides {
                nav_timeout_secs: Some(0),
                ..CompareOverrides::default()
            },
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("--nav-timeout"));
    }

    #[test]
    fn invalid_config_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "delays = [1, 2, 3, 4]\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Invalid config"));
        assert!(message.contains("bad.toml"));
    }
}
