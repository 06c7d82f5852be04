//! Extraction directive loading and the framing sent to vision providers.
//!
//! The directive itself is user-authored plain text (what fields to pull out
//! of each paper). It is loaded once at startup; a missing or empty file is a
//! setup error because every document would otherwise fail the same way.

use crate::error::Pdf2DataError;
use std::path::Path;

/// Load and trim the extraction directive.
pub fn load_directive(path: &Path) -> Result<String, Pdf2DataError> {
    if !path.is_file() {
        return Err(Pdf2DataError::PromptNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|_| Pdf2DataError::PromptNotFound {
        path: path.to_path_buf(),
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Err(Pdf2DataError::PromptEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(text.to_string())
}

/// System prompt wrapped around the directive for page-image providers.
///
/// The Gemini client sends the directive verbatim next to the uploaded file;
/// chat-style vision models need to be told explicitly that the images are
/// one document and that the answer must be bare JSON.
pub const VISION_SYSTEM_PROMPT: &str = r#"You are a meticulous research data extractor. The user will send the pages of ONE PDF document as images, in reading order.

Follow these rules precisely:

1. Extract exactly what the EXTRACTION INSTRUCTIONS below ask for, from the whole document.
2. Answer with a JSON array of flat objects (one object per extracted record).
   Values must be strings, numbers, booleans or null. No nested objects.
3. If a value is not reported in the document, use null. Never invent values.
4. Output ONLY the JSON. No commentary, no Markdown fences."#;

/// Build the full system message for a vision provider.
pub fn vision_system_prompt(directive: &str) -> String {
    format!(
        "{}\n\nEXTRACTION INSTRUCTIONS:\n\"\"\"{}\"\"\"",
        VISION_SYSTEM_PROMPT, directive
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_directive_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let err = load_directive(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, Pdf2DataError::PromptNotFound { .. }));
        assert!(err.is_setup());
    }

    #[test]
    fn blank_directive_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("extraction_prompt.txt");
        std::fs::write(&p, "  \n\t\n").unwrap();
        assert!(matches!(
            load_directive(&p),
            Err(Pdf2DataError::PromptEmpty { .. })
        ));
    }

    #[test]
    fn directive_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("extraction_prompt.txt");
        std::fs::write(&p, "\nEXTRACT: Material Name, Bandgap\n\n").unwrap();
        assert_eq!(load_directive(&p).unwrap(), "EXTRACT: Material Name, Bandgap");
    }

    #[test]
    fn vision_prompt_embeds_directive() {
        let p = vision_system_prompt("EXTRACT: Bandgap");
        assert!(p.starts_with(VISION_SYSTEM_PROMPT));
        assert!(p.contains("EXTRACT: Bandgap"));
    }
}
