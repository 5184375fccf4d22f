use anyhow::{Context, Result};
use distpack_lib::PackError;
use std::{
    fs,
    path::{Path, PathBuf},
};

use glob::Pattern;

/// Compiles skip patterns, failing on the first invalid one.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid skip pattern: {p}")))
        .collect()
}

/// A path is skipped when a pattern matches its full path, its path relative
/// to `base` (with `/` separators), or its bare file name.
fn is_skipped(path: &Path, base: &Path, patterns: &[Pattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let path_str = path.to_string_lossy();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let relative = path.strip_prefix(base).ok().map(|rel| {
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    });
    patterns.iter().any(|p| {
        p.matches(&path_str)
            || p.matches(&file_name)
            || relative.as_deref().is_some_and(|rel| p.matches(rel))
    })
}

/// Recursively lists all files under `dir`, excluding any that match `skip`.
/// Relative patterns such as `Mod/Draft/*` are matched against the path
/// below `base`, normally the install root.
/// Entries are sorted so archives come out in a stable order.
pub fn list_files(base: &Path, dir: &Path, skip: &[Pattern]) -> Result<Vec<PathBuf>> {
    fn walk_dir(
        base: &Path,
        dir: &Path,
        patterns: &[Pattern],
        result: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let mut entries = fs::read_dir(dir)
            .with_context(|| format!("reading directory {dir:?}"))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("reading directory {dir:?}"))?;
        entries.sort();

        for path in entries {
            if is_skipped(&path, base, patterns) {
                continue;
            }

            if path.is_dir() {
                walk_dir(base, &path, patterns, result)?;
            } else {
                result.push(path);
            }
        }
        Ok(())
    }

    let mut result = Vec::new();
    walk_dir(base, dir, skip, &mut result)?;
    Ok(result)
}

/// Sums the sizes of `files`.
pub fn total_size(files: &[PathBuf]) -> Result<u64> {
    let mut total: u64 = 0;
    for path in files {
        let meta = fs::metadata(path).with_context(|| format!("reading metadata of {path:?}"))?;
        total += meta.len();
    }
    Ok(total)
}

/// Fails with [`PackError::SizeLimitExceeded`] when `total` is above `limit`.
/// A limit of zero means unlimited.
pub fn check_size_limit(total: u64, limit: Option<&str>) -> Result<()> {
    let Some(limit_str) = limit else {
        return Ok(());
    };
    let limit_bytes = parse_size(limit_str)?;
    if limit_bytes > 0 && total > limit_bytes {
        return Err(PackError::SizeLimitExceeded {
            total,
            limit: limit_str.to_string(),
            limit_bytes,
        }
        .into());
    }
    Ok(())
}

/// Parse human-readable sizes in both binary (Ki/Mi/Gi) and decimal (KB/MB/GB) units.
/// Examples: "512Mi", "10Gi", "1MB", "500kb", "1024", "2.5GB"
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_ascii_lowercase();

    const SUFFIXES: [(&str, u64); 8] = [
        ("ki", 1024),
        ("mi", 1024 * 1024),
        ("gi", 1024 * 1024 * 1024),
        ("ti", 1024 * 1024 * 1024 * 1024),
        ("kb", 1000),
        ("mb", 1000 * 1000),
        ("gb", 1000 * 1000 * 1000),
        ("tb", 1000 * 1000 * 1000 * 1000),
    ];

    let (multiplier, number_str) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| s.strip_suffix(suffix).map(|rest| (*mult, rest)))
        .unwrap_or((1, s.as_str()));

    let number: f64 = number_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;
    if number < 0.0 {
        anyhow::bail!("Invalid size format: {} (negative)", s);
    }

    Ok((number * multiplier as f64) as u64)
}

/// Convert bytes into a human-friendly string using binary (KiB, MiB, GiB...) units.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if (size * 10.0) % 10.0 == 0.0 {
        format!("{:.0} {}", size, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TempTree;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1Ki").unwrap(), 1024);
        assert_eq!(parse_size("512Mi").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
        assert_eq!(parse_size(" 2.5gb ").unwrap(), 2_500_000_000);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-5").is_err());
    }

    #[test]
    fn test_encode_size() {
        assert_eq!(encode_size(0), "0 B");
        assert_eq!(encode_size(512), "512 B");
        assert_eq!(encode_size(1024), "1 KiB");
        assert_eq!(encode_size(1536), "1.5 KiB");
        assert_eq!(encode_size(3 * 1024 * 1024), "3 MiB");
    }

    #[test]
    fn test_list_files_sorted_and_recursive() {
        let tree = TempTree::new("list");
        tree.file("Mod/b.py", "b");
        tree.file("Mod/a.py", "a");
        tree.file("Mod/Draft/init.py", "x");

        let files = list_files(tree.path(), &tree.path().join("Mod"), &[]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(tree.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["Mod/Draft/init.py", "Mod/a.py", "Mod/b.py"]);
    }

    #[test]
    fn test_list_files_respects_skip_patterns() {
        let tree = TempTree::new("skip");
        tree.file("bin/app.exe", "x");
        tree.file("bin/app.pdb", "debug");
        tree.file("bin/__pycache__/m.pyc", "c");

        let patterns = compile_patterns(&["*.pdb".to_string(), "__pycache__".to_string()]).unwrap();
        let files = list_files(tree.path(), &tree.path().join("bin"), &patterns).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app.exe"));
    }

    #[test]
    fn test_list_files_matches_paths_relative_to_base() {
        let tree = TempTree::new("skip-rel");
        tree.file("Mod/Draft/Init.py", "draft");
        tree.file("Mod/Draft/Resources/icon.svg", "<svg/>");
        tree.file("Mod/Part/Init.py", "part");

        let patterns = compile_patterns(&["Mod/Draft/*".to_string()]).unwrap();
        let files = list_files(tree.path(), &tree.path().join("Mod"), &patterns).unwrap();
        assert_eq!(files, vec![tree.path().join("Mod/Part/Init.py")]);
    }

    #[test]
    fn test_invalid_skip_pattern() {
        assert!(compile_patterns(&["[".to_string()]).is_err());
    }

    #[test]
    fn test_total_size_and_limit() {
        let tree = TempTree::new("size");
        let a = tree.file("data/a", "12345");
        let b = tree.file("data/b", "678");
        let total = total_size(&[a, b]).unwrap();
        assert_eq!(total, 8);

        assert!(check_size_limit(total, None).is_ok());
        assert!(check_size_limit(total, Some("0")).is_ok());
        assert!(check_size_limit(total, Some("8")).is_ok());

        let err = check_size_limit(total, Some("4")).unwrap_err();
        let pack = err.downcast_ref::<PackError>().unwrap();
        assert_eq!(pack.exit_code(), 42);
    }
}
