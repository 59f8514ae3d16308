//! `clean`: deterministic cleanup of text documents.
//!
//! Converted books often arrive with mixed line endings, trailing blanks,
//! long runs of empty lines and invisible Unicode left behind by editors
//! (zero-width spaces, BOMs, soft hyphens). This stage fixes those without
//! touching content.
//!
//! Input that is not valid UTF-8 is rejected with
//! [`StageError::Transform`] rather than silently mangled.

use crate::error::StageError;
use crate::stage::{Stage, StageContext, StageKind, StageReader, StageWriter};
use crate::stages::transform_all;
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;

pub struct TextCleanup {
    input: StageReader,
    output: StageWriter,
}

impl StageKind for TextCleanup {
    const NAME: &'static str = "clean";
    const FILE_EXTENSION: &'static str = ".clean";

    fn construct(ctx: StageContext) -> Self {
        Self {
            input: ctx.input,
            output: ctx.output,
        }
    }
}

impl Stage for TextCleanup {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>> {
        let TextCleanup { input, output } = *self;
        transform_all(input, output, |bytes| {
            let text = String::from_utf8(bytes).map_err(|e| {
                StageError::Transform(format!(
                    "input is not UTF-8 (invalid byte at offset {})",
                    e.utf8_error().valid_up_to()
                ))
            })?;
            Ok(clean_text(&text).into_bytes())
        })
        .boxed()
    }
}

/// Blank lines kept between two paragraphs; longer runs are shortened.
pub const MAX_BLANK_LINES: usize = 2;

/// CRLF, lone CR and LF all end a line.
static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// Zero-width characters, word joiner, BOM and soft hyphen.
static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{00AD}\u{200B}-\u{200D}\u{2060}\u{FEFF}]").unwrap());

/// Clean a whole document in one pass over its lines.
///
/// Every line loses invisible characters and trailing whitespace and is
/// re-terminated with `\n`. Runs of blank lines longer than
/// [`MAX_BLANK_LINES`] are shortened. Leading blank lines are kept; trailing
/// ones are dropped so the result ends in exactly one newline.
pub fn clean_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 1);
    let mut blank_run = 0;

    for raw in RE_LINE_BREAK.split(input) {
        let visible = RE_INVISIBLE.replace_all(raw, "");
        let line = visible.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_LINES {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    let end = out.trim_end().len();
    out.truncate(end);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::run;

    #[test]
    fn mixed_line_endings_become_lf() {
        assert_eq!(clean_text("Vorwort\r\nKapitel 1\rKapitel 2\n"), "Vorwort\nKapitel 1\nKapitel 2\n");
    }

    #[test]
    fn indentation_survives_trailing_blanks_do_not() {
        assert_eq!(clean_text("    code();   \n\tmore\t"), "    code();\n\tmore\n");
    }

    #[test]
    fn long_blank_runs_are_shortened() {
        assert_eq!(clean_text("Absatz\n\n\n\n\n\nAbsatz"), "Absatz\n\n\nAbsatz\n");
        assert_eq!(clean_text("a\n\nb"), "a\n\nb\n");
    }

    #[test]
    fn whitespace_only_lines_count_as_blank() {
        assert_eq!(clean_text("a\n  \n\t\n \u{200B}\n\nb"), "a\n\n\nb\n");
    }

    #[test]
    fn invisible_characters_are_removed() {
        let input = "\u{FEFF}Java\u{00AD}Script ist\u{200B} keine\u{2060} Insel";
        assert_eq!(clean_text(input), "JavaScript ist keine Insel\n");
    }

    #[test]
    fn document_ends_with_one_newline() {
        assert_eq!(clean_text("Ende"), "Ende\n");
        assert_eq!(clean_text("Ende\n\n\n\n"), "Ende\n");
        assert_eq!(clean_text(""), "\n");
    }

    #[test]
    fn leading_blank_lines_are_kept() {
        assert_eq!(clean_text("\n\nTitel"), "\n\nTitel\n");
    }

    #[test]
    fn chapter_cleanup_end_to_end() {
        let input = "\u{FEFF}Kapitel 1   \r\n\r\n\r\n\r\n\r\nText\u{200B} hier\t\r\n";
        assert_eq!(clean_text(input), "Kapitel 1\n\n\nText hier\n");
    }

    #[tokio::test]
    async fn stage_cleans_text() {
        let out = run::<TextCleanup>(b"line one  \r\nline two").await.unwrap();
        assert_eq!(out, b"line one\nline two\n");
    }

    #[tokio::test]
    async fn stage_rejects_invalid_utf8() {
        let err = run::<TextCleanup>(b"ok\xff\xfe").await.unwrap_err();
        assert!(matches!(err, StageError::Transform(ref m) if m.contains("offset 2")), "got: {err}");
    }
}
