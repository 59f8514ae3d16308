//! Built-in stages.
//!
//! Each submodule implements one transformation. All of them follow the
//! [`crate::stage::Stage`] contract: consume the input, write the output,
//! shut the output down.
//!
//! | Name           | Extension | Effect |
//! |----------------|-----------|--------|
//! | `copy`         | `.copy`   | byte-for-byte copy |
//! | `upper`        | `.upper`  | ASCII upper-casing, streamed |
//! | `lower`        | `.lower`  | ASCII lower-casing, streamed |
//! | `reverse`      | `.rev`    | reverses the whole byte sequence |
//! | `clean`        | `.clean`  | deterministic text cleanup |
//! | `front-matter` | `.fm`     | prepends YAML front-matter from the book |
//!
//! [`builtin_registry`] registers all of them.

pub mod case;
pub mod clean;
pub mod front_matter;
pub mod passthrough;
pub mod reverse;

pub use case::{Lowercase, Uppercase};
pub use clean::TextCleanup;
pub use front_matter::FrontMatter;
pub use passthrough::Passthrough;
pub use reverse::Reverse;

use crate::error::StageError;
use crate::registry::StageRegistry;
use crate::stage::{StageReader, StageWriter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Read size for stages that stream their input.
const CHUNK_SIZE: usize = 8 * 1024;

/// A registry holding every built-in stage.
pub fn builtin_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry.register::<Passthrough>();
    registry.register::<Uppercase>();
    registry.register::<Lowercase>();
    registry.register::<Reverse>();
    registry.register::<TextCleanup>();
    registry.register::<FrontMatter>();
    registry
}

/// Buffer the whole input, transform it, write the result and close the output.
pub(crate) async fn transform_all<F>(
    mut input: StageReader,
    mut output: StageWriter,
    transform: F,
) -> Result<(), StageError>
where
    F: FnOnce(Vec<u8>) -> Result<Vec<u8>, StageError>,
{
    let mut buf = Vec::new();
    input.read_to_end(&mut buf).await?;
    drop(input);

    let out = transform(buf)?;
    output.write_all(&out).await?;
    output.shutdown().await?;
    Ok(())
}

/// Rewrite the input chunk by chunk in place and forward each chunk.
pub(crate) async fn map_chunks<F>(
    mut input: StageReader,
    mut output: StageWriter,
    mut map: F,
) -> Result<(), StageError>
where
    F: FnMut(&mut [u8]),
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        map(&mut buf[..n]);
        output.write_all(&buf[..n]).await?;
    }
    output.shutdown().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::book::Book;
    use crate::error::StageError;
    use crate::stage::{Stage, StageContext, StageKind};
    use std::path::Path;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    /// Run a stage of type `S` over `input` with the given book; return its output.
    pub async fn run_with_book<S: StageKind>(
        input: &[u8],
        book: Book,
    ) -> Result<Vec<u8>, StageError> {
        let (writer, mut reader) = tokio::io::duplex(1024);
        let mut source = tokio_test::io::Builder::new();
        if !input.is_empty() {
            source.read(input);
        }
        let stage = S::construct(StageContext {
            input: Box::new(source.build()),
            output: Box::new(writer),
            book: Arc::new(book),
            original_file: Arc::from(Path::new("book.html")),
        });

        let collect = async move {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).await.map(|_| out)
        };
        let (ran, collected) = tokio::join!(Box::new(stage).run(), collect);
        ran?;
        Ok(collected?)
    }

    pub async fn run<S: StageKind>(input: &[u8]) -> Result<Vec<u8>, StageError> {
        run_with_book::<S>(input, Book::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_every_stage() {
        let registry = builtin_registry();
        assert_eq!(
            registry.names(),
            vec!["clean", "copy", "front-matter", "lower", "reverse", "upper"]
        );
        for name in registry.names() {
            let entry = registry.get(name).unwrap();
            assert!(entry.require_extension().unwrap().starts_with('.'));
        }
    }
}
