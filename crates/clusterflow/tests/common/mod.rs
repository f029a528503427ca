use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestState {
    pub root: TempDir,
}

impl TestState {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// Write `<root>/<name>/cluster.json`
    pub fn write_cluster(&self, name: &str, content: &str) {
        let dir = self.root.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("cluster.json"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn has_cluster(&self, name: &str) -> bool {
        self.root.path().join(name).join("cluster.json").exists()
    }
}

/// Minimal valid document for `name`
pub fn cluster_json(name: &str, min: u32, max: u32) -> String {
    format!(
        r#"{{
  "version": 1,
  "name": "{name}",
  "cloud": "amazon",
  "location": "us-west-2",
  "server_pools": [
    {{ "name": "master", "role": "master", "size": "t3.medium", "min_count": 1, "max_count": 1 }},
    {{ "name": "node", "role": "node", "size": "t3.large", "min_count": {min}, "max_count": {max} }}
  ]
}}"#
    )
}
