//! Startup discovery of watched log files (spec §4.4): scan
//! `LOG_SOURCES/<container-id>/` subdirectories, resolve each container's
//! name from its `config.v2.json` (or `hostconfig.json` as a fallback),
//! and keep only the containers named in `CONTAINERS`.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WatchedFile {
    pub container_id: String,
    pub container_name: String,
    pub path: PathBuf,
}

/// Best-effort container name resolution. Real `config.v2.json` files have
/// a top-level `"Name"` field (e.g. `"/my-container"`); some older/alternate
/// layouts only carry a `Config.Hostname`. Both are tried.
fn resolve_container_name(container_dir: &Path, container_id: &str) -> String {
    let config_path = container_dir.join("config.v2.json");
    if let Ok(content) = fs::read_to_string(&config_path) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
            if let Some(name) = value.get("Name").and_then(|v| v.as_str()) {
                return name.trim_start_matches('/').to_string();
            }
            if let Some(name) = value
                .get("Config")
                .and_then(|c| c.get("Hostname"))
                .and_then(|v| v.as_str())
            {
                return name.to_string();
            }
        }
    }
    let hostconfig_path = container_dir.join("hostconfig.json");
    if let Ok(content) = fs::read_to_string(&hostconfig_path) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
            if let Some(name) = value.get("Name").and_then(|v| v.as_str()) {
                return name.trim_start_matches('/').to_string();
            }
        }
    }
    container_id.to_string()
}

/// Scan `log_sources` for `<container-id>/<container-id>-json.log` files,
/// filtered to the containers named in `containers` (by resolved name).
/// An empty `containers` list matches nothing, per spec's "keep only
/// those whose name is in the configured CONTAINERS list".
pub fn scan_sources(log_sources: &str, containers: &[String]) -> Vec<WatchedFile> {
    let root = Path::new(log_sources);
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(root) else {
        tracing::warn!(log_sources, "LOG_SOURCES directory not readable");
        return found;
    };
    for entry in entries.flatten() {
        let container_dir = entry.path();
        if !container_dir.is_dir() {
            continue;
        }
        let container_id = match container_dir.file_name().and_then(|n| n.to_str()) {
            Some(id) => id.to_string(),
            None => continue,
        };
        let container_name = resolve_container_name(&container_dir, &container_id);
        if !containers.iter().any(|c| c == &container_name) {
            continue;
        }
        let log_path = container_dir.join(format!("{container_id}-json.log"));
        if log_path.is_file() {
            found.push(WatchedFile {
                container_id,
                container_name,
                path: log_path,
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn discovers_matching_container_only() {
        let dir = tempfile::tempdir().unwrap();
        let c1 = dir.path().join("abc123");
        fs::create_dir_all(&c1).unwrap();
        fs::write(c1.join("config.v2.json"), r#"{"Name":"/web"}"#).unwrap();
        let mut f = fs::File::create(c1.join("abc123-json.log")).unwrap();
        writeln!(f, "{{}}").unwrap();

        let c2 = dir.path().join("def456");
        fs::create_dir_all(&c2).unwrap();
        fs::write(c2.join("config.v2.json"), r#"{"Name":"/worker"}"#).unwrap();
        fs::File::create(c2.join("def456-json.log")).unwrap();

        let found = scan_sources(dir.path().to_str().unwrap(), &["web".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].container_name, "web");
        assert_eq!(found[0].container_id, "abc123");
    }

    #[test]
    fn falls_back_to_container_id_when_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        let c1 = dir.path().join("zzz999");
        fs::create_dir_all(&c1).unwrap();
        fs::File::create(c1.join("zzz999-json.log")).unwrap();
        let found = scan_sources(dir.path().to_str().unwrap(), &["zzz999".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].container_name, "zzz999");
    }
}
