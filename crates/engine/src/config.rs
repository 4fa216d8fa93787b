//! Index-directory configuration resolution (spec §6 "Configuration",
//! §9 open question 1). Mirrors `original_source/src/FTSUtils.cpp::
//! getFtsDirectory` exactly: try `fts.conf` first, fall back to
//! `fts.ini`, fail with `no-config` if neither supplies a usable
//! `ftsDirectory` for the current database.

use std::path::{Path, PathBuf};

use fts_errors::{FtsError, Result};

/// The resolved index root for one database: every index's on-disk
/// directory is `index_root.join(index_name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtsConfig {
    pub index_root: PathBuf,
}

impl FtsConfig {
    pub fn index_dir_for(&self, index_name: &str) -> PathBuf {
        self.index_root.join(index_name)
    }
}

/// Resolves the index root for `database_name` by looking in
/// `config_root/fts.conf` then `config_root/fts.ini`.
pub fn load(config_root: &Path, database_name: &str) -> Result<FtsConfig> {
    if let Some(dir) = try_conf(config_root, database_name)? {
        return Ok(FtsConfig { index_root: dir });
    }
    if let Some(dir) = try_ini(config_root, database_name)? {
        return Ok(FtsConfig { index_root: dir });
    }
    Err(FtsError::no_config(format!(
        "neither fts.conf nor fts.ini under \"{}\" supplies ftsDirectory for database \"{database_name}\"",
        config_root.display()
    )))
}

/// `fts.conf`: a `[[database]]` array of tables (or a single flat
/// `database = "..."` table) each carrying `ftsDirectory`.
fn try_conf(config_root: &Path, database_name: &str) -> Result<Option<PathBuf>> {
    let path = config_root.join("fts.conf");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    let value: toml::Value = contents
        .parse()
        .map_err(|e| FtsError::no_config(format!("malformed fts.conf: {e}")))?;

    if let Some(databases) = value.get("database").and_then(|v| v.as_array()) {
        for entry in databases {
            if entry.get("name").and_then(|v| v.as_str()) == Some(database_name) {
                if let Some(dir) = entry.get("ftsDirectory").and_then(|v| v.as_str()) {
                    return Ok(Some(PathBuf::from(dir)));
                }
            }
        }
        return Ok(None);
    }

    if value.get("database").and_then(|v| v.as_str()) == Some(database_name) {
        if let Some(dir) = value.get("ftsDirectory").and_then(|v| v.as_str()) {
            return Ok(Some(PathBuf::from(dir)));
        }
    }
    Ok(None)
}

/// `fts.ini`: a `[<database-name>]` section's `ftsDirectory` key.
fn try_ini(config_root: &Path, database_name: &str) -> Result<Option<PathBuf>> {
    let path = config_root.join("fts.ini");
    if !path.exists() {
        return Ok(None);
    }
    let ini = ini::Ini::load_from_file(&path)
        .map_err(|e| FtsError::no_config(format!("malformed fts.ini: {e}")))?;
    Ok(ini
        .section(Some(database_name))
        .and_then(|section| section.get("ftsDirectory"))
        .map(PathBuf::from))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_from_array_of_tables_conf() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("fts.conf")).unwrap();
        writeln!(f, "[[database]]\nname = \"mydb\"\nftsDirectory = \"/var/fts/mydb\"").unwrap();
        let cfg = load(dir.path(), "mydb").unwrap();
        assert_eq!(cfg.index_root, PathBuf::from("/var/fts/mydb"));
    }

    #[test]
    fn loads_from_flat_conf() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("fts.conf")).unwrap();
        writeln!(f, "database = \"mydb\"\nftsDirectory = \"/var/fts/mydb\"").unwrap();
        let cfg = load(dir.path(), "mydb").unwrap();
        assert_eq!(cfg.index_root, PathBuf::from("/var/fts/mydb"));
    }

    #[test]
    fn falls_back_to_ini_when_conf_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("fts.ini")).unwrap();
        writeln!(f, "[mydb]\nftsDirectory=/var/fts/mydb").unwrap();
        let cfg = load(dir.path(), "mydb").unwrap();
        assert_eq!(cfg.index_root, PathBuf::from("/var/fts/mydb"));
    }

    #[test]
    fn conf_takes_precedence_over_ini() {
        let dir = tempfile::tempdir().unwrap();
        let mut conf = std::fs::File::create(dir.path().join("fts.conf")).unwrap();
        writeln!(conf, "database = \"mydb\"\nftsDirectory = \"/from/conf\"").unwrap();
        let mut ini_file = std::fs::File::create(dir.path().join("fts.ini")).unwrap();
        writeln!(ini_file, "[mydb]\nftsDirectory=/from/ini").unwrap();
        let cfg = load(dir.path(), "mydb").unwrap();
        assert_eq!(cfg.index_root, PathBuf::from("/from/conf"));
    }

    #[test]
    fn missing_both_files_fails_with_no_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), "mydb").unwrap_err();
        assert_eq!(err.short_msg(), "NoConfig");
    }
}
