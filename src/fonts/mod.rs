//! Font discovery for report rendering.
//!
//! Reports mix Latin and Thai text, so the renderer needs the `Sarabun`
//! family.  Fonts are resolved once at startup by the caller and handed to
//! the report builder; nothing in the rendering path searches the filesystem.
//!
//! Search order: `QC_REPORT_FONTS_DIR`, `assets/fonts` next to the running
//! binary, then `assets/fonts` in this crate's source tree.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::warn;

/// Name of the font family used by reports.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Sarabun";

/// Environment variable overriding the font directory.
pub const FONTS_DIR_ENV: &str = "QC_REPORT_FONTS_DIR";

const FONT_FILES: &[&str] = &[
    "Sarabun-Regular.ttf",
    "Sarabun-Bold.ttf",
    "Sarabun-Italic.ttf",
    "Sarabun-BoldItalic.ttf",
];

const REGULAR_FONT_FILE: &str = "Sarabun-Regular.ttf";

/// Directory holding the fonts that ship with the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(path) = env::var(FONTS_DIR_ENV) {
        if !path.trim().is_empty() {
            candidates.push(PathBuf::from(path));
        }
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.iter().any(|existing| existing == &candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = bundled_fonts_source_dir();
    if !candidates
        .iter()
        .any(|existing| existing == &manifest_candidate)
    {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn missing_font_files(path: &Path) -> Vec<PathBuf> {
    FONT_FILES
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn not_found(message: String) -> Error {
    Error::new(
        message,
        io::Error::new(io::ErrorKind::NotFound, "report fonts not found"),
    )
}

fn load_full_family(directory: &Path) -> Result<FontFamily<FontData>, Error> {
    fonts::from_files(directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Builds a family that uses the regular face for every style.
fn load_regular_only_family(directory: &Path) -> Result<FontFamily<FontData>, Error> {
    let path = directory.join(REGULAR_FONT_FILE);
    let regular = FontData::load(&path, None).map_err(|err| {
        Error::new(
            format!("Failed to load font {}: {}", path.display(), err),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })?;

    Ok(FontFamily {
        regular: regular.clone(),
        bold: regular.clone(),
        italic: regular.clone(),
        bold_italic: regular,
    })
}

/// Loads the report font family from the first usable candidate directory.
///
/// A directory with all four faces wins.  Failing that, a directory holding
/// only the regular face is used with a warning, since bold and italic then
/// render as regular text.
pub fn load_font_family() -> Result<FontFamily<FontData>, Error> {
    let candidates = font_directory_candidates();
    let mut attempts = Vec::new();

    for candidate in &candidates {
        if !candidate.is_dir() {
            attempts.push(format!("{} (directory missing)", candidate.display()));
            continue;
        }

        let missing = missing_font_files(candidate);
        if missing.is_empty() {
            return load_full_family(candidate);
        }

        let missing_list = missing
            .iter()
            .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
            .collect::<Vec<_>>()
            .join(", ");
        attempts.push(format!("{} (missing files [{}])", candidate.display(), missing_list));
    }

    for candidate in &candidates {
        if candidate.join(REGULAR_FONT_FILE).is_file() {
            warn!(
                "Only {} found in {}; bold and italic text will use the regular face.",
                REGULAR_FONT_FILE,
                candidate.display()
            );
            return load_regular_only_family(candidate);
        }
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(not_found(format!(
        "Unable to locate report fonts. Checked: {}. Set {} to a directory containing {}.",
        summary, FONTS_DIR_ENV, REGULAR_FONT_FILE
    )))
}

/// Whether a font error means the fonts are absent rather than unreadable.
pub fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Indicates whether a usable report font can be found.
pub fn fonts_available() -> bool {
    font_directory_candidates()
        .iter()
        .any(|candidate| candidate.join(REGULAR_FONT_FILE).is_file())
}
