use super::*;

use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load(Some(&dir.path().join("settings.toml"))).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.dat_prune_keep, 3);
    assert_eq!(settings.dat.import_batch_size, 500);
    assert_eq!(settings.dat.archive_timeout(), Duration::from_secs(120));
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(
        &path,
        r#"
data_dir = "/srv/romshelf"

[worker]
concurrency = 8

[selection]
region_priority = ["Europe", "USA"]

[scan]
ignore = ["*.txt", "bios/**"]
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.worker.concurrency, 8);
    assert_eq!(settings.worker.max_attempts, 5);
    assert_eq!(settings.selection.region_priority, vec!["Europe", "USA"]);
    assert!(settings.selection.prefer_verified);
    assert_eq!(settings.scan.ignore.len(), 2);
    assert_eq!(
        settings.database_path(),
        PathBuf::from("/srv/romshelf/romshelf.db")
    );
    assert_eq!(
        settings.dat_storage_dir("psx"),
        PathBuf::from("/srv/romshelf/dats/psx")
    );
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "dat_prune_keep = \"lots\"").unwrap();
    assert!(matches!(
        Settings::load(Some(&path)),
        Err(SettingsError::Parse { .. })
    ));
}

#[test]
fn save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.toml");
    let mut settings = Settings::default();
    settings.dat_prune_keep = 1;
    settings.scan.ignore = vec!["*.nfo".to_string()];

    settings.save(&path).unwrap();
    assert!(!path.with_extension("toml.tmp").exists());
    assert_eq!(Settings::load(Some(&path)).unwrap(), settings);
}
