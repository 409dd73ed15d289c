//! Better error messages with actionable suggestions.

use rowtask::Registry;
use std::path::Path;

/// Build an error message for an operation id the registry does not know.
pub fn unknown_operation_error(id: &str, registry: &Registry) -> String {
    let mut msg = format!("Unknown operation '{id}'");

    let known: Vec<&str> = registry.declarations().map(|d| d.id.as_str()).collect();
    if let Some(suggestion) = find_similar(id, &known) {
        msg.push_str(&format!(".\n\nDid you mean '{suggestion}'?"));
    } else if !known.is_empty() {
        msg.push_str(&format!(".\n\nAvailable operations: {}", known.join(", ")));
    }
    msg.push_str("\nRun `rowtask list` to see all operations and their options.");

    msg
}

/// Build an error message for a preset name the config does not define.
pub fn unknown_preset_error(name: &str, presets: &[&str]) -> String {
    let mut msg = format!("Unknown preset '{name}'");

    if let Some(suggestion) = find_similar(name, presets) {
        msg.push_str(&format!(".\n\nDid you mean '{suggestion}'?"));
    } else if presets.is_empty() {
        msg.push_str(".\n\nNo presets are defined. Add [presets.NAME] to the config file.");
    }

    msg
}

/// Build an error message for a file that could not be read.
pub fn file_read_error(path: &Path, err: &std::io::Error) -> String {
    use std::io::ErrorKind;

    let mut msg = format!("Failed to read '{}'", path.display());

    match err.kind() {
        ErrorKind::NotFound => {
            msg.push_str(": file not found");

            let suggestions = find_similar_files(path).unwrap_or_default();
            if !suggestions.is_empty() {
                msg.push_str(&format!(".\n\nDid you mean: {}?", suggestions.join(", ")));
            }
        }
        ErrorKind::PermissionDenied => {
            msg.push_str(": permission denied. Check file permissions.");
        }
        _ => {
            msg.push_str(&format!(": {err}"));
        }
    }

    msg
}

/// Closest candidate within edit distance 2.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input = input.to_lowercase();
    candidates
        .iter()
        .map(|c| (levenshtein(&input, c), *c))
        .filter(|(d, c)| *d <= 2 && *c != input)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

/// Simple Levenshtein distance for short strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find similar files in the same directory (for "did you mean" suggestions).
fn find_similar_files(path: &Path) -> Option<Vec<String>> {
    let filename = path.file_name()?.to_str()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let entries = std::fs::read_dir(parent).ok()?;
    let mut suggestions = Vec::new();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if levenshtein(filename, name) <= 2 && name != filename {
            suggestions.push(name.to_string());
        }
    }

    suggestions.sort();
    suggestions.truncate(3);
    Some(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        rowtask_ops::register_all(&mut registry);
        registry
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("concat", "concat"), 0);
        assert_eq!(levenshtein("concat", "concatt"), 1);
        assert_eq!(levenshtein("lookup", "lokup"), 1);
        assert_eq!(levenshtein("abc", "xyz"), 3);
    }

    #[test]
    fn test_unknown_operation_suggests() {
        let msg = unknown_operation_error("concta", &registry());
        assert!(msg.contains("Did you mean 'concat'?"), "{msg}");
    }

    #[test]
    fn test_unknown_operation_lists_when_nothing_close() {
        let msg = unknown_operation_error("frobnicate", &registry());
        assert!(msg.contains("Available operations: concat, template"), "{msg}");
    }

    #[test]
    fn test_unknown_preset() {
        let msg = unknown_preset_error("vist-id", &["visit-id"]);
        assert!(msg.contains("Did you mean 'visit-id'?"));
        assert!(unknown_preset_error("x", &[]).contains("No presets are defined"));
    }

    #[test]
    fn test_file_read_error_suggests_sibling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("patients.csv"), "a\n").unwrap();

        let missing = dir.path().join("patient.csv");
        let err = std::fs::read(&missing).unwrap_err();
        let msg = file_read_error(&missing, &err);
        assert!(msg.contains("file not found"));
        assert!(msg.contains("patients.csv"), "{msg}");
    }
}
