use regex::Regex;

use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn write_string_to_file(filename: &str, content: &str) -> std::io::Result<()> {
    let path = Path::new(filename);
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Derive a URL-safe slug from a dashboard title.
///
/// Lowercases, drops everything outside `[a-z0-9 -]`, collapses whitespace
/// runs into single hyphens and trims leading/trailing hyphens.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = Regex::new(r"[^a-z0-9\s-]")
        .unwrap()
        .replace_all(&lowered, "");
    let dashed = Regex::new(r"\s+").unwrap().replace_all(&stripped, "-");
    dashed.trim_matches('-').to_string()
}
