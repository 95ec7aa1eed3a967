//! Locate a launchable Chrome/Chromium before any session exists.

use std::path::{Path, PathBuf};

/// Common Chrome executable paths to check.
pub const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Executable names looked up on PATH.
pub const CHROME_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// First existing path from `paths`, else the first of `names` found on PATH.
pub fn resolve_browser_runtime<P: AsRef<Path>>(paths: &[P], names: &[&str]) -> Option<PathBuf> {
    paths
        .iter()
        .map(AsRef::as_ref)
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
        .or_else(|| names.iter().find_map(|name| which::which(name).ok()))
}

/// Resolve using an explicit override first, then the built-in candidates.
pub fn find_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }
    resolve_browser_runtime(CHROME_PATHS, CHROME_NAMES)
}

/// Installation hint shown when no browser is found.
pub const INSTALL_HINT: &str = "Chrome/Chromium not found. Please install it:\n\
     - Arch/Manjaro: sudo pacman -S chromium\n\
     - Ubuntu/Debian: sudo apt install chromium-browser\n\
     - Fedora: sudo dnf install chromium\n\
     - Or download from: https://www.google.com/chrome/\n\
     Or point browser.chrome_path / VIDACQUIRE_CHROME at an executable.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_first_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("chrome-a");
        let second = dir.path().join("chrome-b");
        std::fs::write(&second, b"").unwrap();
        std::fs::write(&first, b"").unwrap();

        let missing = dir.path().join("missing");
        let found = resolve_browser_runtime(&[missing, first.clone(), second], &[]);
        assert_eq!(found, Some(first));
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let found = resolve_browser_runtime(
            &[dir.path().join("nope")],
            &["vidacquire-definitely-not-a-browser"],
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_directory_is_not_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let found = resolve_browser_runtime(&[dir.path()], &[]);
        assert_eq!(found, None);
    }

    #[test]
    fn test_explicit_override() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("my-chrome");
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(find_chrome(Some(&exe)), Some(exe.clone()));
        assert_eq!(find_chrome(Some(&dir.path().join("gone"))), None);
    }
}
