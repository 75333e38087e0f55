use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

pub const INDEX_HTML: &str =
    "<!doctype html><html><head><title>Conspire with Koala</title></head><body><div id=\"root\"></div></body></html>";
pub const APP_JS: &str = "console.log('koala');";

/// A built frontend bundle on disk: `index.html` plus one asset.
pub struct StaticSite {
    _dir: TempDir,
    pub static_dir: PathBuf,
    pub index_file: PathBuf,
}

impl StaticSite {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let static_dir = dir.path().join("dist");
        fs::create_dir_all(static_dir.join("assets")).expect("asset dir should be created");

        let index_file = static_dir.join("index.html");
        fs::write(&index_file, INDEX_HTML).expect("index should be written");
        fs::write(static_dir.join("assets").join("app.js"), APP_JS)
            .expect("asset should be written");

        Self {
            _dir: dir,
            static_dir,
            index_file,
        }
    }
}
