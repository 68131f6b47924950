//! # Text Rewriter Module
//!
//! Questo modulo riscrive i riferimenti ai video proprietari dentro i file html,
//! così i link restano validi dopo la conversione.
//!
//! ## Responsabilità:
//! - Sostituzione del frammento di suffisso (`mp4` → `webm`), con `None` se nulla cambia
//! - Decodifica UTF-8 con fallback latin-1, ricodifica con la stessa codifica
//! - Scrittura atomica tramite file temporaneo accanto alla destinazione

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Substitute `new_suffix` for every old suffix found in `text`.
///
/// An old suffix is looked up literally anywhere in the text; when found, every
/// occurrence of its fragment (the suffix minus its leading separator) is
/// replaced by the fragment of `new_suffix`. Returns `None` when no old suffix
/// occurs, so a second pass over the output is always `None`.
pub fn rewrite<S: AsRef<str>>(text: &str, old_suffixes: &[S], new_suffix: &str) -> Option<String> {
    let new_fragment = fragment(new_suffix);
    let mut text = std::borrow::Cow::Borrowed(text);
    let mut changed = false;

    for old in old_suffixes {
        let old = old.as_ref();
        if text.contains(old) {
            text = std::borrow::Cow::Owned(text.replace(fragment(old), new_fragment));
            changed = true;
        }
    }

    changed.then(|| text.into_owned())
}

fn fragment(suffix: &str) -> &str {
    let mut chars = suffix.chars();
    chars.next();
    chars.as_str()
}

/// How an html file was decoded, so it can be written back the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Every byte is one character
    Latin1,
}

impl TextEncoding {
    pub fn decode(bytes: Vec<u8>) -> (String, Self) {
        match String::from_utf8(bytes) {
            Ok(text) => (text, Self::Utf8),
            Err(e) => {
                let text = e.into_bytes().into_iter().map(char::from).collect();
                (text, Self::Latin1)
            }
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            // Decoded text only holds chars below 256 and the fragments are ASCII
            Self::Latin1 => text.chars().map(|c| c as u32 as u8).collect(),
        }
    }
}

/// Read `source` and rewrite it; `None` when nothing needs to change
pub async fn rewrite_file<S: AsRef<str>>(
    source: &Path,
    old_suffixes: &[S],
    new_suffix: &str,
) -> Result<Option<Vec<u8>>> {
    let bytes = tokio::fs::read(source)
        .await
        .with_context(|| format!("Failed to read {}", source.display()))?;
    let (text, encoding) = TextEncoding::decode(bytes);
    Ok(rewrite(&text, old_suffixes, new_suffix).map(|rewritten| encoding.encode(&rewritten)))
}

/// Write `content` to `destination` through a temporary sibling, so a failed
/// write never leaves a half-rewritten file behind. The file appears with
/// `permissions` already set.
pub fn write_atomically(
    destination: &Path,
    content: &[u8],
    permissions: Option<std::fs::Permissions>,
) -> Result<()> {
    let parent = destination
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid destination: {}", destination.display()))?;

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to stage a write in {}", parent.display()))?;
    staged.write_all(content)?;
    staged.flush()?;
    if let Some(permissions) = permissions {
        staged.as_file().set_permissions(permissions)?;
    }
    staged
        .persist(destination)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", destination.display(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROPRIETARY: [&str; 2] = [".mp4", ".flv"];

    #[test]
    fn test_rewrite_replaces_every_reference() {
        let html = r#"<video src="intro.mp4"></video><a href="talks/keynote.mp4">keynote</a>"#;
        let rewritten = rewrite(html, &PROPRIETARY, ".webm").unwrap();
        assert_eq!(
            rewritten,
            r#"<video src="intro.webm"></video><a href="talks/keynote.webm">keynote</a>"#
        );
    }

    #[test]
    fn test_rewrite_no_change_sentinel() {
        assert_eq!(rewrite("<p>nothing to see</p>", &PROPRIETARY, ".ogv"), None);
        assert_eq!(rewrite("", &PROPRIETARY, ".ogv"), None);
    }

    #[test]
    fn test_rewrite_handles_several_suffixes() {
        let html = "old.flv and new.mp4";
        assert_eq!(
            rewrite(html, &PROPRIETARY, ".ogv").as_deref(),
            Some("old.ogv and new.ogv")
        );
    }

    #[test]
    fn test_rewrite_replaces_fragment_not_separator() {
        // Only the part after the separator is swapped, wherever it appears
        let html = "clip.mp4 (mp4)";
        assert_eq!(
            rewrite(html, &PROPRIETARY, ".webm").as_deref(),
            Some("clip.webm (webm)")
        );
        // A bare fragment without the full suffix triggers nothing
        assert_eq!(rewrite("an mp4 player", &PROPRIETARY, ".webm"), None);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let samples = [
            "a.mp4 b.flv c.mp4.mp4",
            "<source src='x.mp4' type='video/mp4'>",
            "no video here",
        ];
        for sample in samples {
            let once = rewrite(sample, &PROPRIETARY, ".webm");
            let base = once.as_deref().unwrap_or(sample);
            assert_eq!(rewrite(base, &PROPRIETARY, ".webm"), None, "sample: {}", sample);
        }
    }

    #[test]
    fn test_latin1_round_trip_is_lossless() {
        let bytes = b"caf\xe9 <a href=\"v.mp4\">".to_vec();
        let (text, encoding) = TextEncoding::decode(bytes);
        assert_eq!(encoding, TextEncoding::Latin1);
        let rewritten = rewrite(&text, &PROPRIETARY, ".ogv").unwrap();
        assert_eq!(encoding.encode(&rewritten), b"caf\xe9 <a href=\"v.ogv\">".to_vec());
    }

    #[tokio::test]
    async fn test_rewrite_file_and_atomic_write() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("index.html");
        std::fs::write(&page, "<video src=\"video.mp4\">").unwrap();

        let content = rewrite_file(&page, &PROPRIETARY, ".webm").await.unwrap().unwrap();
        let out = dir.path().join("out.html");
        write_atomically(&out, &content, None).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "<video src=\"video.webm\">");

        // Nothing left over next to the destination
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_rewrite_file_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let result = rewrite_file(&dir.path().join("gone.html"), &PROPRIETARY, ".webm").await;
        assert!(result.is_err());
    }
}
