use std::path::PathBuf;

const LOG_DIR: &str = "logs";
const HINTS_DIR: &str = "hints";

#[derive(Clone)]
pub struct HhmDirs {
    app_dir: PathBuf,
    pub log_dir: PathBuf,
    pub hints_dir: PathBuf,
}

impl HhmDirs {
    pub fn new(app_dir: PathBuf) -> Self {
        std::fs::create_dir_all(&app_dir).unwrap();

        let log_dir = app_dir.join(LOG_DIR);
        let _ = std::fs::create_dir(&log_dir);

        let hints_dir = app_dir.join(HINTS_DIR);
        let _ = std::fs::create_dir(&hints_dir);

        Self {
            app_dir,
            log_dir,
            hints_dir,
        }
    }
}
