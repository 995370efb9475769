use std::iter::repeat;
use std::path::{Path, PathBuf};

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// Formats a percentage with two decimals and a trailing `%`.
pub fn percent_label(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Rounds to one decimal place, the precision reports use for scores.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpath_search_returns_first_match() {
        let found = find_first_subpath("/root", &["a.yml", "b.yml"], |p| p.ends_with("b.yml"));
        assert_eq!(found, Some(PathBuf::from("/root/b.yml")));
    }

    #[test]
    fn percent_label_uses_two_decimals() {
        assert_eq!(percent_label(400.0 / 6.0), "66.67%");
        assert_eq!(percent_label(0.0), "0.00%");
    }
}
