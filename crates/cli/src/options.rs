//! Options-file support: extra long options read from a file and
//! appended to the command line before parsing.

use std::fs;
use std::path::Path;

/// Append the whitespace-separated tokens of `path` to `args`. Blank
/// lines and `#` comments are skipped.
pub(crate) fn merge_options_file(
    args: impl Iterator<Item = String>,
    path: &Path,
) -> std::io::Result<Vec<String>> {
    let mut merged: Vec<String> = args.collect();
    for line in fs::read_to_string(path)?.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        merged.extend(line.split_whitespace().map(str::to_string));
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blanks_are_skipped() {
        let dir = std::env::temp_dir().join("cardsmith-options-test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("options.txt");
        std::fs::write(&file, "# defaults\n\n--pin1 1234\n--driver soft\n").unwrap();

        let merged = merge_options_file(
            ["cardsmith".to_string(), "erase-card".to_string()].into_iter(),
            &file,
        )
        .unwrap();
        assert_eq!(
            merged,
            vec!["cardsmith", "erase-card", "--pin1", "1234", "--driver", "soft"]
        );
    }
}
