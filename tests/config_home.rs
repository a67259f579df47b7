mod support;

use soundromeda::app_dirs::AppDirs;
use soundromeda::config::{self, CONFIG_FILE_NAME, LayoutConfig};
use support::config_env::ConfigHomeGuard;
use tempfile::tempdir;

#[test]
fn config_and_logs_live_under_overridden_home() {
    let dir = tempdir().unwrap();
    let _guard = ConfigHomeGuard::set(dir.path().to_path_buf());

    let path = config::config_path().unwrap();
    assert_eq!(path, dir.path().join(".soundromeda").join(CONFIG_FILE_NAME));
    assert_eq!(config::load_or_default(&path).unwrap(), LayoutConfig::default());

    let mut custom = LayoutConfig::default();
    custom.layout.n_neighbors = 5;
    custom.paths.base_audio_path = "static/audio/".to_string();
    config::save_to_path(&custom, &path).unwrap();
    assert_eq!(config::load_or_default(&path).unwrap(), custom);

    let logs = AppDirs::resolve().unwrap().logs_dir().unwrap();
    assert!(logs.starts_with(dir.path()));
    assert!(logs.is_dir());
}
