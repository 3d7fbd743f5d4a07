use std::env;
use std::path::{Path, PathBuf};

const FALLBACK_DOTENV: &str = "ccarchive/.env";

/// `.env` consulted when the working directory has none: under
/// `CCARCHIVE_HOME` when set, otherwise under the user's home.
fn fallback_dotenv_path(state_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    state_home
        .filter(|p| !p.as_os_str().is_empty())
        .or(home_dir)
        .map(|base| base.join(FALLBACK_DOTENV))
}

/// Load `path` when it is a regular file. Variables already set win.
fn load_fallback(path: &Path) -> bool {
    path.is_file() && dotenvy::from_path(path).is_ok()
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Some(path) = fallback_dotenv_path(
        env::var_os("CCARCHIVE_HOME").map(PathBuf::from),
        dirs::home_dir(),
    ) {
        load_fallback(&path);
    }
}
