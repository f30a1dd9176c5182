//! Centralized package naming conventions.
//!
//! This module is the single source of truth for all on-disk names:
//! - Local working directories (e.g., `castle-kit-v1.2`)
//! - The manifest file (`manifest.json`)
//! - Content filenames (e.g., `gate.swcreation`)
//! - Archive filenames (e.g., `castle-kit-1.2.swole`)
//!
//! All other modules should use these functions rather than constructing names directly.
//! The loader and the save path must agree on every name here.

use std::path::{Path, PathBuf};

use super::PackageIdentifier;

/// Name of the manifest file at the root of every package.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Extension of portable package archives, without the leading dot.
pub const ARCHIVE_EXTENSION: &str = "swole";

/// Marker appended to display names of packages found inside another archive.
pub const EMBEDDED_MARKER: &str = "(embedded)";

/// Cache sub-directory holding the caches of embedded packages.
pub const EMBEDDED_CACHE_DIR: &str = "embedded";

/// Generate the working directory name for a local package.
///
/// # Format
///
/// `{name}-v{version}`
///
/// # Examples
///
/// ```
/// use swole::package::{local_directory_name, PackageIdentifier};
///
/// let id = PackageIdentifier::parse("castle-kit", "1.2").unwrap();
/// assert_eq!(local_directory_name(&id), "castle-kit-v1.2");
/// ```
pub fn local_directory_name(id: &PackageIdentifier) -> String {
    format!("{}-v{}", sanitize_file_stem(&id.name), id.version)
}

/// Generate the archive filename for a package.
///
/// # Examples
///
/// ```
/// use swole::package::{archive_filename, PackageIdentifier};
///
/// let id = PackageIdentifier::parse("castle-kit", "1.2").unwrap();
/// assert_eq!(archive_filename(&id), "castle-kit-1.2.swole");
/// ```
pub fn archive_filename(id: &PackageIdentifier) -> String {
    format!(
        "{}-{}.{}",
        sanitize_file_stem(&id.name),
        id.version,
        ARCHIVE_EXTENSION
    )
}

/// Generate the filename of one content item.
///
/// `extension` is given without the leading dot.
///
/// # Examples
///
/// ```
/// use swole::package::content_filename;
///
/// assert_eq!(content_filename("Main Gate", "swcreation"), "Main Gate.swcreation");
/// assert_eq!(content_filename("a/b", "swlua"), "a_b.swlua");
/// ```
pub fn content_filename(name: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_file_stem(name), extension)
}

/// Replace characters that cannot appear in a single path component.
///
/// An empty or all-dot stem becomes `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Normalize a package name for liberal matching.
///
/// Lower-cases the name and drops whitespace and the `-`, `_` and `.`
/// separators, so `"My Pack"`, `"my-pack"` and `"MYPACK"` all compare equal.
///
/// # Examples
///
/// ```
/// use swole::package::liberal_id;
///
/// assert_eq!(liberal_id("My Pack"), "mypack");
/// assert_eq!(liberal_id("my_pack.v2"), "mypackv2");
/// ```
pub fn liberal_id(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a file name is a package archive.
pub fn is_archive_filename(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Cache directory of a package embedded in the package cached at `parent`.
///
/// # Format
///
/// `{parent}/embedded/{directory_name}`
pub fn embedded_cache_path(parent: &Path, directory_name: &str) -> PathBuf {
    parent.join(EMBEDDED_CACHE_DIR).join(directory_name)
}
