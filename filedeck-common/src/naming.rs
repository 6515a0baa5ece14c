//! Pathname helpers: extension splitting, rename-target resolution and
//! collision suffixes.

use anyhow::bail;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random token inserted by [`with_random_suffix`].
pub const SUFFIX_LEN: usize = 30;

/// Substring after the last `.` of `name`, if any.
pub fn extension(name: &str) -> Option<&str> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext)
}

/// Split the final path segment of `name` into stem and extension.
///
/// A leading dot (`.env`) is part of the stem, not an extension separator.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    let file_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    let file = &name[file_start..];
    match file.rfind('.') {
        Some(0) | None => (name, None),
        Some(dot) if dot + 1 == file.len() => (name, None),
        Some(dot) => (&name[..file_start + dot], Some(&file[dot + 1..])),
    }
}

/// Decoded last path segment of an object url.
pub fn pathname_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}

/// Name a renamed object will be stored under.
///
/// A new name without a `.` inherits the old pathname's extension.
pub fn resolve_rename_target(old_pathname: &str, new_name: &str) -> String {
    if new_name.contains('.') {
        return new_name.to_string();
    }
    match extension(old_pathname) {
        Some(ext) => format!("{}.{}", new_name, ext),
        None => new_name.to_string(),
    }
}

pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

/// `notes.txt` → `notes-<token>.txt`
pub fn with_random_suffix(name: &str) -> String {
    suffixed(name, &random_token())
}

fn suffixed(name: &str, token: &str) -> String {
    match split_extension(name) {
        (stem, Some(ext)) => format!("{}-{}.{}", stem, token, ext),
        (stem, None) => format!("{}-{}", stem, token),
    }
}

/// Clean a requested pathname so it cannot escape a store's namespace.
pub fn normalize_pathname(name: &str) -> anyhow::Result<String> {
    let cleaned: Vec<&str> = name
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if cleaned.is_empty() {
        bail!("pathname {:?} is empty after normalization", name);
    }
    Ok(cleaned.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(extension("report.pdf"), Some("pdf"));
        assert_eq!(extension("archive.tar.gz"), Some("gz"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension("trailing."), None);
        assert_eq!(extension("v1.2/notes"), None);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("notes.txt"), ("notes", Some("txt")));
        assert_eq!(split_extension("dir.v2/notes"), ("dir.v2/notes", None));
        assert_eq!(split_extension("a/b.c.md"), ("a/b.c", Some("md")));
        assert_eq!(split_extension(".env"), (".env", None));
    }

    #[test]
    fn test_pathname_from_url() {
        assert_eq!(
            pathname_from_url("https://store/x/report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            pathname_from_url("https://store/my%20file.txt").as_deref(),
            Some("my file.txt")
        );
        assert_eq!(pathname_from_url("not a url"), None);
    }

    #[test]
    fn test_resolve_rename_target() {
        assert_eq!(resolve_rename_target("report.pdf", "summary"), "summary.pdf");
        assert_eq!(resolve_rename_target("report.pdf", "summary.txt"), "summary.txt");
        assert_eq!(resolve_rename_target("README", "readme"), "readme");
    }

    #[test]
    fn test_suffix_goes_before_extension() {
        assert_eq!(suffixed("notes.txt", "abc"), "notes-abc.txt");
        assert_eq!(suffixed("Makefile", "abc"), "Makefile-abc");
        assert_eq!(suffixed("img/cat.jpeg", "abc"), "img/cat-abc.jpeg");

        let name = with_random_suffix("draft.md");
        assert!(name.starts_with("draft-"));
        assert!(name.ends_with(".md"));
        assert_eq!(name.len(), "draft-.md".len() + SUFFIX_LEN);
    }

    #[test]
    fn test_normalize_pathname() {
        assert_eq!(normalize_pathname("/a/../b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_pathname("..\\..\\etc\\passwd").unwrap(), "etc/passwd");
        assert_eq!(normalize_pathname(" notes.txt ").unwrap(), "notes.txt");
        assert!(normalize_pathname("../..").is_err());
    }
}
