use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::Rng;
use std::path::{Path, PathBuf};

/// Values substituted into an archive name template.
#[derive(Debug, Clone)]
pub struct NameContext<'a> {
    /// Folder being archived, `None` for a combined archive.
    pub folder: Option<&'a str>,
    /// Last component of the install root.
    pub root_name: &'a str,
    pub now: DateTime<Utc>,
}

/// Expands placeholders in `template` (case-insensitive).
///
/// A combined archive has no single folder, so `%folder%` falls back to the
/// root name there.
pub fn render_name(template: &str, ctx: &NameContext<'_>) -> String {
    let now = ctx.now;
    let folder = ctx.folder.unwrap_or(ctx.root_name);

    let replacements = [
        ("%folder%", folder.to_string()),
        ("%root%", ctx.root_name.to_string()),
        ("%datetime%", now.format("%Y-%m-%d_%H-%M-%S").to_string()),
        ("%longrand%", random_string(12)),
        ("%rand%", random_string(5)),
        ("%date%", now.format("%Y-%m-%d").to_string()),
        ("%time%", now.format("%H-%M-%S").to_string()),
        ("%yyyy%", format!("{:04}", now.year())),
        ("%yy%", format!("{:02}", now.year() % 100)),
        ("%dd%", format!("{:02}", now.day())),
        ("%hh%", format!("{:02}", now.hour())),
        ("%mm%", format!("{:02}", now.minute())),
        ("%ss%", format!("{:02}", now.second())),
        ("%unix%", format!("{}", now.timestamp())),
    ];

    let mut name = template.to_string();
    for (pattern, value) in replacements {
        name = replace_case_insensitive(&name, pattern, &value);
    }
    name
}

/// Resolves the output directory; relative paths are taken from the install root.
pub fn output_dir(root: &Path, output: Option<&str>) -> PathBuf {
    match output {
        Some(out) if !out.is_empty() => {
            let out = Path::new(out);
            if out.is_absolute() {
                out.to_path_buf()
            } else {
                root.join(out)
            }
        }
        _ => root.to_path_buf(),
    }
}

/// Name of the root directory, used for `%root%`.
pub fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".into())
}

/// Generates a random lowercase alphanumeric string.
fn random_string(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CHARS.len());
            CHARS[idx] as char
        })
        .collect()
}

/// Helper for case-insensitive substring replacement
fn replace_case_insensitive(s: &str, pattern: &str, replacement: &str) -> String {
    // Lowercasing can change byte lengths outside ASCII, so only fold ASCII.
    let lower_s = s.to_ascii_lowercase();
    let lower_pattern = pattern.to_ascii_lowercase();

    let mut result = String::new();
    let mut last_end = 0;
    let mut search_start = 0;

    while let Some(pos) = lower_s[search_start..].find(&lower_pattern) {
        let abs_pos = search_start + pos;
        result.push_str(&s[last_end..abs_pos]);
        result.push_str(replacement);
        last_end = abs_pos + pattern.len();
        search_start = last_end;
    }

    result.push_str(&s[last_end..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx(folder: Option<&'static str>) -> NameContext<'static> {
        NameContext {
            folder,
            root_name: "FreeCAD",
            now: Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap(),
        }
    }

    #[test]
    fn test_folder_placeholder() {
        assert_eq!(render_name("%folder%.zip", &ctx(Some("Mod"))), "Mod.zip");
        assert_eq!(render_name("%FOLDER%.7z", &ctx(Some("bin"))), "bin.7z");
    }

    #[test]
    fn test_combined_falls_back_to_root() {
        assert_eq!(render_name("%folder%.zip", &ctx(None)), "FreeCAD.zip");
        assert_eq!(render_name("%root%-full.zip", &ctx(None)), "FreeCAD-full.zip");
    }

    #[test]
    fn test_date_placeholders() {
        let name = render_name("%root%_%date%_%hh%%mm%%ss%.zip", &ctx(None));
        assert_eq!(name, "FreeCAD_2024-03-07_090501.zip");
        assert_eq!(render_name("%yy%%dd%", &ctx(None)), "2407");
        assert_eq!(
            render_name("%datetime%", &ctx(None)),
            "2024-03-07_09-05-01"
        );
    }

    #[test]
    fn test_random_placeholders() {
        let short = render_name("%rand%", &ctx(None));
        let long = render_name("%longrand%", &ctx(None));
        assert_eq!(short.len(), 5);
        assert_eq!(long.len(), 12);
        assert!(long.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_output_dir_resolution() {
        let root = Path::new("/opt/FreeCAD");
        assert_eq!(output_dir(root, None), PathBuf::from("/opt/FreeCAD"));
        assert_eq!(output_dir(root, Some("")), PathBuf::from("/opt/FreeCAD"));
        assert_eq!(
            output_dir(root, Some("dist")),
            PathBuf::from("/opt/FreeCAD/dist")
        );
        #[cfg(unix)]
        assert_eq!(output_dir(root, Some("/tmp/out")), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_root_name() {
        assert_eq!(root_name(Path::new("/opt/FreeCAD")), "FreeCAD");
    }
}
