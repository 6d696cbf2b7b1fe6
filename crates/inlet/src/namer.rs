//! Local filename resolution for downloaded files.
//!
//! Inbox filenames carry a second-resolution timestamp prefix so they sort
//! chronologically, a sanitized version of the remote name so a human can
//! tell them apart, and a numeric suffix when the path is already taken.
//! Uniqueness is probed through a caller-supplied predicate evaluated at
//! call time — downstream tools write into the inbox too, so the in-memory
//! state alone cannot be trusted.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Characters stripped from the stem outright.
const STRIPPED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '(', ')'];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Resolve a collision-free path for `original_name` inside `dir`.
///
/// `now` should be the deployment's wall clock (local time); whichever zone
/// is chosen must stay consistent across a deployment so the prefix stays
/// sortable. `exists` is consulted for every candidate, `_1`, `_2`, … until
/// a free path is found.
pub fn resolve_local_path(
    dir: &Path,
    original_name: &str,
    now: NaiveDateTime,
    exists: impl Fn(&Path) -> bool,
) -> PathBuf {
    let (stem, extension) = split_extension(original_name);
    let stem = sanitize_stem(stem);
    let prefix = now.format(TIMESTAMP_FORMAT).to_string();

    let base = if stem.is_empty() {
        prefix
    } else {
        format!("{prefix}_{stem}")
    };

    let with_ext = |name: &str| {
        if extension.is_empty() {
            dir.join(name)
        } else {
            dir.join(format!("{name}.{extension}"))
        }
    };

    let candidate = with_ext(&base);
    if !exists(&candidate) {
        return candidate;
    }

    let mut counter = 1u32;
    loop {
        let candidate = with_ext(&format!("{base}_{counter}"));
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Split on the last dot. No dot means no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (name, ""),
    }
}

/// Collapse whitespace runs to single hyphens, drop the stripped set, keep
/// everything else. Runs in one pass; the hyphen for a whitespace run is
/// emitted before the following character regardless of whether that
/// character itself survives.
fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut pending_hyphen = false;
    for ch in stem.chars() {
        if ch.is_whitespace() {
            pending_hyphen = true;
            continue;
        }
        if pending_hyphen {
            out.push('-');
            pending_hyphen = false;
        }
        if STRIPPED.contains(&ch) {
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    fn never_exists(_: &Path) -> bool {
        false
    }

    #[test]
    fn timestamped_and_sanitized() {
        let path = resolve_local_path(
            Path::new("/inbox"),
            "Recording 4.acc",
            at("2026-02-01T18:55:09"),
            never_exists,
        );
        assert_eq!(
            path,
            Path::new("/inbox/2026-02-01_18-55-09_Recording-4.acc")
        );
    }

    #[test]
    fn strips_special_characters() {
        let path = resolve_local_path(
            Path::new("/inbox"),
            r#"Weird<>:"/\|?*()Name.wav"#,
            at("2026-02-01T18:55:09"),
            never_exists,
        );
        assert_eq!(path, Path::new("/inbox/2026-02-01_18-55-09_WeirdName.wav"));
    }

    #[test]
    fn suffixes_until_free() {
        let taken = [
            PathBuf::from("/inbox/2026-02-01_18-55-09_Recording-4.acc"),
            PathBuf::from("/inbox/2026-02-01_18-55-09_Recording-4_1.acc"),
        ];
        let path = resolve_local_path(
            Path::new("/inbox"),
            "Recording 4.acc",
            at("2026-02-01T18:55:09"),
            |p| taken.iter().any(|t| t == p),
        );
        assert_eq!(
            path,
            Path::new("/inbox/2026-02-01_18-55-09_Recording-4_2.acc")
        );
    }

    #[test]
    fn no_extension() {
        let path = resolve_local_path(
            Path::new("/inbox"),
            "README",
            at("2026-02-01T18:55:09"),
            never_exists,
        );
        assert_eq!(path, Path::new("/inbox/2026-02-01_18-55-09_README"));
    }

    #[test]
    fn empty_stem_yields_bare_timestamp() {
        let path = resolve_local_path(
            Path::new("/inbox"),
            "()().wav",
            at("2026-02-01T18:55:09"),
            never_exists,
        );
        assert_eq!(path, Path::new("/inbox/2026-02-01_18-55-09.wav"));
    }

    #[test]
    fn whitespace_runs_collapse() {
        let path = resolve_local_path(
            Path::new("/inbox"),
            "voice   note\tfinal.m4a",
            at("2026-02-01T18:55:09"),
            never_exists,
        );
        assert_eq!(
            path,
            Path::new("/inbox/2026-02-01_18-55-09_voice-note-final.m4a")
        );
    }

    #[test]
    fn suffix_lands_before_extension() {
        let path = resolve_local_path(
            Path::new("/inbox"),
            "clip.mp3",
            at("2026-02-01T18:55:09"),
            |p| p == Path::new("/inbox/2026-02-01_18-55-09_clip.mp3"),
        );
        assert_eq!(path, Path::new("/inbox/2026-02-01_18-55-09_clip_1.mp3"));
    }
}
