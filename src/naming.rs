//! Filename normalization for substituted files.
//!
//! A re-encoded image keeps the base name the user picked and takes the
//! output format's extension:
//! - `IMG_2041.HEIC.png` → `IMG_2041.HEIC.jpg` (only the last extension goes)
//! - `holiday` → `holiday.jpg`
//! - `.profile` → `.profile.jpg` (a leading dot is part of the name)
//! - `` → `image.jpg`
//!
//! A batch writes every payload into one flat directory, so base names are
//! reserved up front with [`unique_stems`]: the second `x.*` becomes `x-2.*`.

use crate::imaging::OutputFormat;
use std::collections::HashSet;

/// Fallback base name when the original has none.
pub const DEFAULT_BASE_NAME: &str = "image";

/// Split `name` into base name and extension (without the dot).
///
/// Directory components, if any, are dropped first.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}

/// Filename a substituted file is submitted under.
pub fn normalized_filename(original: &str, format: OutputFormat) -> String {
    let (base, _) = split_extension(original.trim());
    let base = if base.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        base
    };
    format!("{base}.{}", format.extension())
}

/// One distinct base name per input, in input order.
///
/// Collisions are resolved by appending `-2`, `-3`, ... to the later names.
/// Extensions are ignored, since an output's extension depends on the outcome.
pub fn unique_stems<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let (base, _) = split_extension(name.trim());
            let base = if base.is_empty() {
                DEFAULT_BASE_NAME
            } else {
                base
            };
            let mut stem = base.to_string();
            let mut n = 2;
            while !taken.insert(stem.clone()) {
                stem = format!("{base}-{n}");
                n += 1;
            }
            stem
        })
        .collect()
}

/// `filename` with its base name replaced by `stem`.
pub fn with_stem(filename: &str, stem: &str) -> String {
    match split_extension(filename).1 {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_extension() {
        assert_eq!(normalized_filename("photo.png", OutputFormat::Jpeg), "photo.jpg");
    }

    #[test]
    fn replaces_only_last_extension() {
        assert_eq!(normalized_filename("a.b.png", OutputFormat::Jpeg), "a.b.jpg");
    }

    #[test]
    fn jpeg_keeps_canonical_extension() {
        assert_eq!(normalized_filename("scan.JPEG", OutputFormat::Jpeg), "scan.jpg");
    }

    #[test]
    fn appends_when_missing() {
        assert_eq!(normalized_filename("holiday", OutputFormat::Avif), "holiday.avif");
    }

    #[test]
    fn leading_dot_is_part_of_name() {
        assert_eq!(normalized_filename(".profile", OutputFormat::Jpeg), ".profile.jpg");
    }

    #[test]
    fn empty_name_gets_default() {
        assert_eq!(normalized_filename("", OutputFormat::Jpeg), "image.jpg");
        assert_eq!(normalized_filename("   ", OutputFormat::Jpeg), "image.jpg");
    }

    #[test]
    fn directories_are_stripped() {
        assert_eq!(
            normalized_filename("C:\\Users\\me\\cat.webp", OutputFormat::Jpeg),
            "cat.jpg"
        );
        assert_eq!(normalized_filename("dir/dog.gif", OutputFormat::Jpeg), "dog.jpg");
    }

    #[test]
    fn unique_stems_suffix_later_duplicates() {
        assert_eq!(
            unique_stems(["x.txt", "y.png", "x.txt", "x.jpg"]),
            vec!["x", "y", "x-2", "x-3"]
        );
    }

    #[test]
    fn unique_stems_skip_names_already_taken() {
        assert_eq!(
            unique_stems(["x-2.png", "x.png", "x.png"]),
            vec!["x-2", "x", "x-3"]
        );
    }

    #[test]
    fn with_stem_keeps_extension() {
        assert_eq!(with_stem("photo.jpg", "photo-2"), "photo-2.jpg");
        assert_eq!(with_stem("README", "README-2"), "README-2");
    }

    #[test]
    fn split_reports_extension() {
        assert_eq!(split_extension("x.tar.gz"), ("x.tar", Some("gz")));
        assert_eq!(split_extension("README"), ("README", None));
    }
}
