// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language explanations for errors, printed by the CLI under the
// `error[Kind]: message` line.

use crate::error::ScanlayerError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Might succeed if tried again unchanged.
    Transient,
    /// User must change something (install a tool, pick another path).
    ActionRequired,
    /// The input itself cannot be processed.
    Permanent,
}

/// A human-readable error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }
}

/// Convert a `ScanlayerError` into something a non-specialist can act on.
pub fn humanize_error(err: &ScanlayerError) -> HumanError {
    use Severity::*;

    match err {
        ScanlayerError::EngineNotFound(_) => HumanError::new(
            "The Tesseract OCR engine could not be found.",
            "Install Tesseract, or point TESSERACT_CMD (or --tesseract) at the tesseract executable.",
            ActionRequired,
        ),

        ScanlayerError::FontNotFound(_) => HumanError::new(
            "No font that can display the recognized text was found.",
            "Install a font for the OCR language (for Japanese, Noto Sans CJK or IPAex Gothic), or pass --font.",
            ActionRequired,
        ),

        ScanlayerError::PageRender { .. } => HumanError::new(
            "A page could not be turned into an image.",
            "The page may be damaged or use an image format that cannot be decoded. Build with the pdfium feature for full rendering.",
            Permanent,
        ),

        ScanlayerError::Recognition { message, .. } => {
            let lower = message.to_ascii_lowercase();
            if lower.contains("traineddata") || lower.contains("failed loading language") {
                HumanError::new(
                    "The language data for text recognition is missing.",
                    "Install the Tesseract language pack for the configured language (for example tesseract-ocr-jpn).",
                    ActionRequired,
                )
            } else {
                HumanError::new(
                    "Text recognition failed on a page.",
                    "Try again. If it keeps happening, rescan the page at a higher resolution.",
                    Transient,
                )
            }
        }

        ScanlayerError::InvalidPassword => HumanError::new(
            "That password does not open this PDF.",
            "Check the password and try again.",
            ActionRequired,
        ),

        ScanlayerError::AlreadyUnlockedOrUnsupported(_) => HumanError::new(
            "This PDF has no password protection to remove.",
            "The file can be used as it is.",
            Permanent,
        ),

        ScanlayerError::InputNotFound(_) => HumanError::new(
            "The input file could not be found.",
            "Check the path. It may have been moved or deleted.",
            ActionRequired,
        ),

        ScanlayerError::SamePath(_) => HumanError::new(
            "The output would overwrite the input.",
            "Choose a different output path.",
            ActionRequired,
        ),

        ScanlayerError::Pdf(_) => HumanError::new(
            "There is a problem with this PDF file.",
            "The file may be damaged. Try opening it in a PDF viewer to check it works.",
            Permanent,
        ),

        ScanlayerError::Image(_) => HumanError::new(
            "An image on a page could not be processed.",
            "The page image may be damaged or in an unusual format.",
            Permanent,
        ),

        ScanlayerError::Config(detail) => HumanError::new(
            "The configuration is not valid.",
            format!("Fix the setting and run again. ({detail})"),
            ActionRequired,
        ),

        ScanlayerError::Cancelled { .. } => HumanError::new(
            "Processing was cancelled.",
            "No output was written. Run the command again to start over.",
            Transient,
        ),

        ScanlayerError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "A file or folder could not be found.",
                "Check that the paths exist.",
                ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "Permission was denied for a file.",
                "Check the file permissions, or write the output somewhere else.",
                ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If it keeps happening, the disk may be full.",
                Transient,
            ),
        },

        ScanlayerError::Serialization(_) | ScanlayerError::Internal(_) => HumanError::new(
            "Scanlayer hit an internal problem.",
            "Try again. If it keeps happening, please report it with the --verbose log.",
            Transient,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_engine_needs_action() {
        let human = humanize_error(&ScanlayerError::EngineNotFound("tesseract".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(human.suggestion.contains("TESSERACT_CMD"));
    }

    #[test]
    fn missing_language_data_is_detected() {
        let err = ScanlayerError::Recognition {
            page: 0,
            message: "Error opening data file jpn.traineddata".into(),
        };
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }

    #[test]
    fn other_recognition_failures_are_transient() {
        let err = ScanlayerError::Recognition {
            page: 3,
            message: "exit status 1".into(),
        };
        assert!(humanize_error(&err).retriable);
    }

    #[test]
    fn unencrypted_input_is_permanent() {
        let err = ScanlayerError::AlreadyUnlockedOrUnsupported("not encrypted".into());
        assert_eq!(humanize_error(&err).severity, Severity::Permanent);
    }
}
