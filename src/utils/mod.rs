use std::fs::remove_dir_all;
use std::path::{Component, Path};

const BOM: char = '\u{feff}';

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BOM).unwrap_or(text)
}

pub fn strip_bom_bytes(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes)
}

//best-effort cleanup, a failure here must never replace the real status
pub fn remove_dir_quietly(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    match remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("could not remove {}: {}", path.display(), e);
            false
        }
    }
}

//true for plain relative paths that stay inside the directory they are joined to
pub fn is_safe_relative_path(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

pub fn megabytes(bytes: u64) -> f64 {
    (bytes / 1000) as f64 / 1000.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_a_leading_bom() {
        assert_eq!(strip_bom("\u{feff}3"), "3");
        assert_eq!(strip_bom("3\u{feff}"), "3\u{feff}");
        assert_eq!(strip_bom(""), "");
        assert_eq!(strip_bom_bytes(b"\xef\xbb\xbf{}"), b"{}");
        assert_eq!(strip_bom_bytes(b"{}"), b"{}");
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(is_safe_relative_path(Path::new("data/maps/map01.dat")));
        assert!(is_safe_relative_path(Path::new("./game.exe")));
        assert!(!is_safe_relative_path(Path::new("../outside.txt")));
        assert!(!is_safe_relative_path(Path::new("/etc/passwd")));
        assert!(!is_safe_relative_path(Path::new("")));
    }

    #[test]
    fn quiet_removal_of_missing_dir_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("system");
        assert!(remove_dir_quietly(&target));
        std::fs::create_dir_all(target.join("nested")).unwrap();
        assert!(remove_dir_quietly(&target));
        assert!(!target.exists());
    }

    #[test]
    fn megabytes_rounds_down_to_kilobytes() {
        assert_eq!(megabytes(2_500_999), 2.5);
    }
}
