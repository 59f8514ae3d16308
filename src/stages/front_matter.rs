//! `front-matter`: prepend a YAML front-matter block describing the book.
//!
//! The block is built from the shared [`Book`]; the input follows unchanged.
//! Books without any metadata still get a block naming the source file so the
//! output is self-describing.

use crate::book::Book;
use crate::error::StageError;
use crate::stage::{Stage, StageContext, StageKind, StageReader, StageWriter};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

pub struct FrontMatter {
    input: StageReader,
    output: StageWriter,
    book: Arc<Book>,
    original_file: Arc<Path>,
}

impl StageKind for FrontMatter {
    const NAME: &'static str = "front-matter";
    const FILE_EXTENSION: &'static str = ".fm";

    fn construct(ctx: StageContext) -> Self {
        Self {
            input: ctx.input,
            output: ctx.output,
            book: ctx.book,
            original_file: ctx.original_file,
        }
    }
}

impl Stage for FrontMatter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>> {
        let FrontMatter {
            mut input,
            mut output,
            book,
            original_file,
        } = *self;
        async move {
            let header = format_yaml_front_matter(&book, &original_file);
            output.write_all(header.as_bytes()).await?;
            tokio::io::copy(&mut input, &mut output).await?;
            output.shutdown().await?;
            Ok(())
        }
        .boxed()
    }
}

/// Format book metadata as YAML front matter.
pub fn format_yaml_front_matter(book: &Book, original_file: &Path) -> String {
    let mut yaml = String::from("---\n");

    if let Some(ref t) = book.title {
        yaml.push_str(&format!("title: \"{}\"\n", escape(t)));
    }
    if let Some(ref a) = book.author {
        yaml.push_str(&format!("author: \"{}\"\n", escape(a)));
    }
    if let Some(ref l) = book.language {
        yaml.push_str(&format!("language: \"{}\"\n", escape(l)));
    }
    for (key, value) in &book.metadata {
        yaml.push_str(&format!("\"{}\": \"{}\"\n", escape(key), escape(value)));
    }
    if let Some(name) = original_file.file_name() {
        yaml.push_str(&format!(
            "source: \"{}\"\n",
            escape(&name.to_string_lossy())
        ));
    }

    yaml.push_str("---\n\n");
    yaml
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::run_with_book;

    #[test]
    fn front_matter_lists_fields_in_order() {
        let book = Book::new("Java ist auch eine Insel")
            .with_author("Christian Ullenboom")
            .with_language("de")
            .with_meta("edition", "9");
        let yaml = format_yaml_front_matter(&book, Path::new("/books/java/index.htm"));
        assert_eq!(
            yaml,
            "---\n\
             title: \"Java ist auch eine Insel\"\n\
             author: \"Christian Ullenboom\"\n\
             language: \"de\"\n\
             \"edition\": \"9\"\n\
             source: \"index.htm\"\n\
             ---\n\n"
        );
    }

    #[test]
    fn quotes_are_escaped() {
        let book = Book::new(r#"The "Openbook""#);
        let yaml = format_yaml_front_matter(&book, Path::new("b.html"));
        assert!(yaml.contains(r#"title: "The \"Openbook\"""#), "got: {yaml}");
    }

    #[test]
    fn metadata_keys_are_quoted() {
        let book = Book::default()
            .with_meta("series: part", "1")
            .with_meta(r#"say "hi""#, "x");
        let yaml = format_yaml_front_matter(&book, Path::new("b.html"));
        assert!(yaml.contains("\"series: part\": \"1\"\n"), "got: {yaml}");
        assert!(yaml.contains(r#""say \"hi\"": "x""#), "got: {yaml}");
    }

    #[tokio::test]
    async fn stage_prepends_header() {
        let out = run_with_book::<FrontMatter>(b"<p>body</p>", Book::new("T"))
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("---\ntitle: \"T\"\n"), "got: {text}");
        assert!(text.contains("source: \"book.html\""), "got: {text}");
        assert!(text.ends_with("---\n\n<p>body</p>"), "got: {text}");
    }
}
