//! Workspace file lister.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::mission::LocalFile;

/// Maximum number of files reported.
pub const MAX_FILES: usize = 50;

/// List the top level of `dir`, newest first. Hidden entries are skipped.
/// A missing directory is an empty workspace, not an error.
pub fn list_files(dir: &Path) -> Result<Vec<LocalFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<(DateTime<Utc>, LocalFile)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        let metadata = entry.metadata()?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let (icon, kind, description) = if metadata.is_dir() {
            ("📁", "folder".to_string(), "Folder".to_string())
        } else {
            classify(&name)
        };

        entries.push((
            modified,
            LocalFile {
                name,
                description,
                icon: icon.to_string(),
                kind,
                last_modified: modified.format("%Y-%m-%d %H:%M").to_string(),
            },
        ));
    }

    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
    Ok(entries
        .into_iter()
        .take(MAX_FILES)
        .map(|(_, file)| file)
        .collect())
}

fn classify(name: &str) -> (&'static str, String, String) {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let (icon, description) = match ext.as_str() {
        "md" | "markdown" | "txt" => ("📝", "Document"),
        "json" | "yaml" | "yml" | "toml" => ("⚙️", "Configuration"),
        "rs" | "ts" | "tsx" | "js" | "py" | "go" | "sh" => ("💻", "Source code"),
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" => ("🖼️", "Image"),
        "csv" | "xlsx" | "tsv" => ("📊", "Spreadsheet"),
        "pdf" => ("📄", "PDF document"),
        "log" => ("📜", "Log file"),
        _ => ("📎", "File"),
    };

    let kind = if ext.is_empty() { "file".to_string() } else { ext };
    (icon, kind, description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_visible_entries_with_types() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.md"), "# hi").unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join(".secret"), "x").unwrap();
        std::fs::create_dir(dir.path().join("reports")).unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);

        let notes = files.iter().find(|f| f.name == "notes.md").unwrap();
        assert_eq!(notes.kind, "md");
        assert_eq!(notes.description, "Document");

        let reports = files.iter().find(|f| f.name == "reports").unwrap();
        assert_eq!(reports.kind, "folder");
        assert!(files.iter().all(|f| f.name != ".secret"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(&dir.path().join("nope")).unwrap().is_empty());
    }
}
