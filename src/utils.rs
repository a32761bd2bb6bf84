/// Convert a glob pattern (with * and ?) to a regex pattern
pub fn glob_to_regex(pattern: &str, case_sensitive: bool) -> String {
    let mut regex = if case_sensitive {
        String::from("^")
    } else {
        String::from("(?i)^")
    };
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            // Escape regex special characters
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    regex
}

/// Split a file name into stem and extension ("a.tar.gz" -> ("a.tar", Some("gz")))
///
/// Leading-dot names like ".profile" have no extension.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// "report.ktr", 2 -> "report (2).ktr"
pub fn numbered_name(name: &str, n: usize) -> String {
    match split_name(name) {
        (stem, Some(ext)) => format!("{} ({}).{}", stem, n, ext),
        (stem, None) => format!("{} ({})", stem, n),
    }
}

/// Last component of a path in any of the supported grammars
pub fn last_component(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Get available drive letters (Windows only, empty elsewhere)
pub fn get_available_drives() -> Vec<String> {
    #[cfg(windows)]
    {
        let mut drives = Vec::new();
        for letter in b'A'..=b'Z' {
            let drive = format!("{}:", letter as char);
            let path = std::path::Path::new(&drive);
            if path.exists() || std::fs::read_dir(format!("{}\\", drive)).is_ok() {
                drives.push(drive);
            }
        }
        drives
    }
    #[cfg(not(windows))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_regex() {
        let re = regex::Regex::new(&glob_to_regex("*.ktr", false)).unwrap();
        assert!(re.is_match("job.KTR"));
        assert!(!re.is_match("job.ktr.bak"));

        let re = regex::Regex::new(&glob_to_regex("data_?.csv", true)).unwrap();
        assert!(re.is_match("data_1.csv"));
        assert!(!re.is_match("data_10.csv"));
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("report.ktr", 1), "report (1).ktr");
        assert_eq!(numbered_name("folder", 3), "folder (3)");
        assert_eq!(numbered_name(".env", 2), ".env (2)");
    }

    #[test]
    fn test_last_component() {
        assert_eq!(last_component("C:\\Users\\test\\"), "test");
        assert_eq!(last_component("/public/report.ktr"), "report.ktr");
        assert_eq!(last_component("pvfs://box/data/"), "data");
        assert_eq!(last_component("plain"), "plain");
    }
}
