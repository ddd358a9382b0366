/*!
 * Utility functions for repopacker
 */

use std::path::{Component, Path};

use once_cell::sync::Lazy;

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Render a relative path with `/` separators on every platform
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Default gitignore-style patterns, evaluated before any `.gitignore` file
pub static DEFAULT_IGNORE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // Version Control
        ".git/",
        ".svn/",
        ".hg/",
        ".bzr/",
        ".gitignore",
        ".gitattributes",
        // OS Files
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
        // Dependencies
        "node_modules/",
        "bower_components/",
        ".npm/",
        ".yarn/",
        ".pnpm-store/",
        "package-lock.json",
        "yarn.lock",
        "*.lock",
        // Build & Dist
        "dist/",
        "build/",
        "target/",
        "*.min.js",
        "*.min.css",
        // Python
        "__pycache__/",
        ".pytest_cache/",
        ".venv/",
        "venv/",
        ".env",
        "*.pyc",
        "*.pyo",
        "*.pyd",
        "*.egg-info/",
        "*.egg",
        // IDEs & Editors
        ".idea/",
        ".vscode/",
        ".vs/",
        "*.sublime-project",
        "*.sublime-workspace",
        "*.swp",
        "*.swo",
        "*~",
        // Caches & Logs
        ".cache/",
        ".sass-cache/",
        ".eslintcache",
        "*.log",
        // Compiled objects
        "*.o",
        "*.so",
        "*.dll",
        "*.exe",
        "*.class",
        "*.jar",
        "*.war",
        // Media
        "*.png",
        "*.jpg",
        "*.jpeg",
        "*.gif",
        "*.bmp",
        "*.tiff",
        "*.ico",
        "*.mp3",
        "*.wav",
        "*.ogg",
        "*.flac",
        "*.mp4",
        "*.avi",
        "*.mov",
        "*.mkv",
        "*.webm",
        // Documents
        "*.pdf",
        "*.doc",
        "*.docx",
        "*.ppt",
        "*.pptx",
        "*.xls",
        "*.xlsx",
        // Archives
        "*.zip",
        "*.tar.gz",
        "*.tgz",
        "*.rar",
        "*.7z",
        "*.iso",
        // Database
        "*.sqlite",
        "*.sqlite3",
        "*.db",
    ]
});
