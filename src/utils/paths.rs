use std::path::PathBuf;

/// Directory name used under the user's config dir and /etc
const APP_DIR: &str = "cderun";

/// Candidate locations for the tool map, highest priority first
pub fn tools_config_candidates() -> Vec<PathBuf> {
    candidates(".tools.yaml", "tools.yaml")
}

/// Candidate locations for the global config, highest priority first
pub fn global_config_candidates() -> Vec<PathBuf> {
    candidates(".cderun.yaml", "config.yaml")
}

/// Project-local file, then ~/.config/cderun/<name>, then /etc/cderun/<name>
fn candidates(local: &str, name: &str) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(local)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join(APP_DIR).join(name));
    }
    paths.push(PathBuf::from("/etc").join(APP_DIR).join(name));
    paths
}

/// Return the first candidate that exists on disk
pub fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.exists()).cloned()
}
