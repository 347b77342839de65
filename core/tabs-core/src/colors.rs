//! Deterministic color assignment for working directories.
//!
//! The color for a path is MD5 of its UTF-8 bytes, read as a 128-bit integer,
//! modulo the palette length. The mapping is stable across runs, processes,
//! and machines, so a project keeps its color every time it is opened.
//!
//! No normalization happens here. Callers that want `/a/b/` and `/a/b` to
//! share a color must strip the trailing separator first.

/// Palette used when the caller does not supply one.
pub const FALLBACK_PALETTE: [&str; 6] = [
    "#2b8eff", // blue
    "#a9dc76", // green
    "#ab9df2", // magenta
    "#ffd866", // yellow
    "#78dce8", // cyan
    "#f48771", // red
];

/// Returns the palette color for `path`.
///
/// An empty `palette` is treated as absent and [`FALLBACK_PALETTE`] is used.
pub fn color_for<S: AsRef<str>>(path: &str, palette: &[S]) -> String {
    if palette.is_empty() {
        return FALLBACK_PALETTE[palette_index(path, FALLBACK_PALETTE.len())].to_string();
    }
    palette[palette_index(path, palette.len())]
        .as_ref()
        .to_string()
}

fn palette_index(path: &str, len: usize) -> usize {
    let digest = md5::compute(path.as_bytes());
    let hash = u128::from_be_bytes(digest.0);
    (hash % len as u128) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PALETTE;
    use std::collections::HashSet;

    #[test]
    fn same_path_always_gets_same_color() {
        let first = color_for("/home/user/project", &DEFAULT_PALETTE);
        for _ in 0..10 {
            assert_eq!(color_for("/home/user/project", &DEFAULT_PALETTE), first);
        }
    }

    #[test]
    fn result_is_always_a_palette_member() {
        let palette = ["#111111", "#222222", "#333333"];
        for path in ["/", "/a", "/home/user/üñíçødé", "", "relative"] {
            assert!(palette.contains(&color_for(path, &palette).as_str()));
        }
    }

    #[test]
    fn single_color_palette_always_returns_it() {
        let palette = ["#abcdef"];
        for path in ["/a", "/b", "", "/very/long/path"] {
            assert_eq!(color_for(path, &palette), "#abcdef");
        }
    }

    #[test]
    fn empty_palette_uses_fallback() {
        let color = color_for("/tmp", &[] as &[&str]);
        assert!(FALLBACK_PALETTE.contains(&color.as_str()));
    }

    #[test]
    fn matches_md5_reduction() {
        // Full 128-bit digest, not a truncated prefix.
        let digest = md5::compute(b"/home/user");
        let expected = (u128::from_be_bytes(digest.0) % 16) as usize;
        assert_eq!(
            color_for("/home/user", &DEFAULT_PALETTE),
            DEFAULT_PALETTE[expected]
        );
    }

    #[test]
    fn handles_long_and_unicode_paths() {
        let long = format!("/{}", "x".repeat(100_000));
        assert!(DEFAULT_PALETTE.contains(&color_for(&long, &DEFAULT_PALETTE).as_str()));
        assert!(DEFAULT_PALETTE.contains(&color_for("/项目/🚀", &DEFAULT_PALETTE).as_str()));
    }

    #[test]
    fn trailing_slash_is_not_normalized_here() {
        let palette: Vec<String> = (0..64).map(|i| format!("#{:06x}", i)).collect();
        // Distinct inputs are hashed as-is; normalization belongs to the caller.
        let with = color_for("/home/user/project/", &palette);
        let without = color_for("/home/user/project", &palette);
        let digest_with = u128::from_be_bytes(md5::compute("/home/user/project/").0) % 64;
        let digest_without = u128::from_be_bytes(md5::compute("/home/user/project").0) % 64;
        assert_eq!(with == without, digest_with == digest_without);
    }

    #[test]
    fn many_paths_spread_across_palette() {
        let used: HashSet<String> = (0..200)
            .map(|i| color_for(&format!("/home/user/project{}", i), &DEFAULT_PALETTE))
            .collect();
        assert!(used.len() >= 12);
    }
}
