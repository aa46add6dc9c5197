//! Health report assemblers for deployment nodes
//!
//! A shell collector drops text/JSON fragments into a scratch directory; these
//! functions merge them into one report. Every reader is best-effort: a
//! missing or malformed fragment yields an empty or zero value.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads fragments from a collector directory
#[derive(Debug, Clone)]
pub struct Fragments {
    dir: PathBuf,
}

impl Fragments {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Integer content of a file, 0 on any failure
    pub fn read_int(&self, name: &str) -> i64 {
        std::fs::read_to_string(self.path(name))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Non-empty, trimmed lines of a file
    pub fn read_lines(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.path(name))
            .map(|s| {
                s.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parsed JSON, or `fallback` when missing or malformed
    pub fn read_json(&self, name: &str, fallback: Value) -> Value {
        std::fs::read_to_string(self.path(name))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(fallback)
    }

    /// One JSON object per line from docker_ps.jsonl; bad lines are skipped
    pub fn docker_containers(&self) -> Vec<Value> {
        let Ok(content) = std::fs::read_to_string(self.path("docker_ps.jsonl")) else {
            return Vec::new();
        };
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("Skipping malformed docker line: {}", e);
                    None
                }
            })
            .collect()
    }

    /// `err_<name>.log` files keyed by `<name>`; empty logs are omitted
    pub fn error_logs(&self) -> BTreeMap<String, Vec<String>> {
        let mut logs = BTreeMap::new();
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return logs;
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(name) = file_name
                .strip_prefix("err_")
                .and_then(|n| n.strip_suffix(".log"))
            else {
                continue;
            };
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let lines: Vec<String> = content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim_end().to_string())
                .collect();
            if !lines.is_empty() {
                logs.insert(name.to_string(), lines);
            }
        }
        logs
    }

    /// Alternating field/value lines turned into an object
    fn read_pairs(&self, name: &str) -> Map<String, Value> {
        let lines = self.read_lines(name);
        let mut map = Map::new();
        for pair in lines.chunks_exact(2) {
            map.insert(pair[0].clone(), Value::String(pair[1].clone()));
        }
        map
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DockerSection {
    pub containers: Vec<Value>,
    pub error_logs: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostgresSection {
    pub active_connections: i64,
    pub db_size_bytes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyCount {
    pub keys: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyList {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlcSection {
    pub keys: Vec<String>,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedisSection {
    pub db0_cache: KeyCount,
    pub db1_plc: PlcSection,
    pub db2_camera: KeyCount,
    pub db3_settings: KeyList,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthEndpoints {
    pub image_saver: Value,
}

/// Report for a processing node
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    pub docker: DockerSection,
    pub redis: RedisSection,
    pub postgresql: PostgresSection,
    pub health_endpoints: HealthEndpoints,
}

/// Report for a dashboard node
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub docker: DockerSection,
    pub postgresql: PostgresSection,
}

fn docker_section(fragments: &Fragments) -> DockerSection {
    DockerSection {
        containers: fragments.docker_containers(),
        error_logs: fragments.error_logs(),
    }
}

fn postgres_section(fragments: &Fragments) -> PostgresSection {
    PostgresSection {
        active_connections: fragments.read_int("pg_active.txt"),
        db_size_bytes: fragments.read_int("pg_dbsize.txt"),
    }
}

/// Assemble the processing-node report from `dir`
pub fn assemble_processing(dir: &Path) -> ProcessingReport {
    let fragments = Fragments::new(dir);

    let db1_keys = fragments.read_lines("redis_db1_keys.txt");
    let mut db1_values = Map::new();
    for key in &db1_keys {
        let pairs = fragments.read_pairs(&format!("redis_db1_{}.txt", key));
        if !pairs.is_empty() {
            db1_values.insert(key.clone(), Value::Object(pairs));
        }
    }

    ProcessingReport {
        docker: docker_section(&fragments),
        redis: RedisSection {
            db0_cache: KeyCount {
                keys: fragments.read_int("redis_db0.txt"),
            },
            db1_plc: PlcSection {
                keys: db1_keys,
                values: db1_values,
            },
            db2_camera: KeyCount {
                keys: fragments.read_int("redis_db2.txt"),
            },
            db3_settings: KeyList {
                keys: fragments.read_lines("redis_db3_keys.txt"),
            },
        },
        postgresql: postgres_section(&fragments),
        health_endpoints: HealthEndpoints {
            image_saver: fragments.read_json("img_health.json", json!({"status": "parse_error"})),
        },
    }
}

/// Assemble the dashboard-node report from `dir`
pub fn assemble_dashboard(dir: &Path) -> DashboardReport {
    let fragments = Fragments::new(dir);
    DashboardReport {
        docker: docker_section(&fragments),
        postgresql: postgres_section(&fragments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_only_db0_present() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("redis_db0.txt"), "42\n").unwrap();

        let report = serde_json::to_value(assemble_processing(tmp.path())).unwrap();
        assert_eq!(report["redis"]["db0_cache"]["keys"], 42);
        assert_eq!(report["redis"]["db2_camera"]["keys"], 0);
        assert_eq!(report["redis"]["db1_plc"]["keys"], json!([]));
        assert_eq!(report["redis"]["db1_plc"]["values"], json!({}));
        assert_eq!(report["redis"]["db3_settings"]["keys"], json!([]));
        assert_eq!(report["docker"]["containers"], json!([]));
        assert_eq!(report["docker"]["error_logs"], json!({}));
        assert_eq!(report["postgresql"]["active_connections"], 0);
        assert_eq!(report["postgresql"]["db_size_bytes"], 0);
        assert_eq!(
            report["health_endpoints"]["image_saver"],
            json!({"status": "parse_error"})
        );
    }

    #[test]
    fn test_full_processing_report() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(
            dir.join("docker_ps.jsonl"),
            "{\"Names\":\"redis\"}\nnot json\n\n{\"Names\":\"pg\"}\n",
        )
        .unwrap();
        std::fs::write(dir.join("err_image-saver.log"), "boom   \n\n  \nagain\n").unwrap();
        std::fs::write(dir.join("err_quiet.log"), "\n  \n").unwrap();
        std::fs::write(dir.join("redis_db1_keys.txt"), "plc1\nplc2\n").unwrap();
        std::fs::write(dir.join("redis_db1_plc1.txt"), "speed\n12\nstate\nrun\norphan\n").unwrap();
        std::fs::write(dir.join("redis_db1_plc2.txt"), "").unwrap();
        std::fs::write(dir.join("pg_active.txt"), "7").unwrap();
        std::fs::write(dir.join("pg_dbsize.txt"), "not-a-number").unwrap();
        std::fs::write(dir.join("img_health.json"), "{\"status\":\"ok\"}").unwrap();

        let report = serde_json::to_value(assemble_processing(dir)).unwrap();
        assert_eq!(report["docker"]["containers"].as_array().unwrap().len(), 2);
        assert_eq!(
            report["docker"]["error_logs"],
            json!({"image-saver": ["boom", "again"]})
        );
        assert_eq!(
            report["redis"]["db1_plc"]["values"],
            json!({"plc1": {"speed": "12", "state": "run"}})
        );
        assert_eq!(report["postgresql"]["active_connections"], 7);
        assert_eq!(report["postgresql"]["db_size_bytes"], 0);
        assert_eq!(report["health_endpoints"]["image_saver"]["status"], "ok");
    }

    #[test]
    fn test_dashboard_report_shape() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pg_dbsize.txt"), " 1024 ").unwrap();

        let report = serde_json::to_value(assemble_dashboard(tmp.path())).unwrap();
        let obj = report.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(report["postgresql"]["db_size_bytes"], 1024);
    }

    #[test]
    fn test_missing_directory_is_empty_report() {
        let report = assemble_dashboard(Path::new("/nonexistent/jarvis/tmpd"));
        assert!(report.docker.containers.is_empty());
        assert!(report.docker.error_logs.is_empty());
    }
}
