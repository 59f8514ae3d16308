//! `upper` / `lower`: ASCII case mapping.
//!
//! Both stream their input in chunks, so they start producing output before
//! the upstream stage has finished. Only ASCII letters change; multi-byte
//! UTF-8 sequences pass through untouched, which keeps chunk boundaries safe.

use crate::error::StageError;
use crate::stage::{Stage, StageContext, StageKind, StageReader, StageWriter};
use crate::stages::map_chunks;
use futures::future::BoxFuture;
use futures::FutureExt;

pub struct Uppercase {
    input: StageReader,
    output: StageWriter,
}

impl StageKind for Uppercase {
    const NAME: &'static str = "upper";
    const FILE_EXTENSION: &'static str = ".upper";

    fn construct(ctx: StageContext) -> Self {
        Self {
            input: ctx.input,
            output: ctx.output,
        }
    }
}

impl Stage for Uppercase {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>> {
        let Uppercase { input, output } = *self;
        map_chunks(input, output, |chunk| chunk.make_ascii_uppercase()).boxed()
    }
}

pub struct Lowercase {
    input: StageReader,
    output: StageWriter,
}

impl StageKind for Lowercase {
    const NAME: &'static str = "lower";
    const FILE_EXTENSION: &'static str = ".lower";

    fn construct(ctx: StageContext) -> Self {
        Self {
            input: ctx.input,
            output: ctx.output,
        }
    }
}

impl Stage for Lowercase {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>> {
        let Lowercase { input, output } = *self;
        map_chunks(input, output, |chunk| chunk.make_ascii_lowercase()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::run;

    #[tokio::test]
    async fn upper_maps_ascii() {
        assert_eq!(run::<Uppercase>(b"ab").await.unwrap(), b"AB");
    }

    #[tokio::test]
    async fn upper_leaves_utf8_alone() {
        let out = run::<Uppercase>("grüße".as_bytes()).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "GRüßE");
    }

    #[tokio::test]
    async fn lower_maps_ascii() {
        assert_eq!(run::<Lowercase>(b"Chapter 1: INTRO").await.unwrap(), b"chapter 1: intro");
    }

    #[tokio::test]
    async fn large_input_spans_chunks() {
        let input = vec![b'x'; 3 * 8 * 1024 + 17];
        let out = run::<Uppercase>(&input).await.unwrap();
        assert_eq!(out.len(), input.len());
        assert!(out.iter().all(|&b| b == b'X'));
    }
}
