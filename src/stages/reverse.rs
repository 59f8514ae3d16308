//! `reverse`: emits the input bytes in reverse order.
//!
//! Needs the whole input before writing anything.

use crate::error::StageError;
use crate::stage::{Stage, StageContext, StageKind, StageReader, StageWriter};
use crate::stages::transform_all;
use futures::future::BoxFuture;
use futures::FutureExt;

pub struct Reverse {
    input: StageReader,
    output: StageWriter,
}

impl StageKind for Reverse {
    const NAME: &'static str = "reverse";
    const FILE_EXTENSION: &'static str = ".rev";

    fn construct(ctx: StageContext) -> Self {
        Self {
            input: ctx.input,
            output: ctx.output,
        }
    }
}

impl Stage for Reverse {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>> {
        let Reverse { input, output } = *self;
        transform_all(input, output, |mut bytes| {
            bytes.reverse();
            Ok(bytes)
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::run;

    #[tokio::test]
    async fn reverses_bytes() {
        assert_eq!(run::<Reverse>(b"ab").await.unwrap(), b"ba");
        assert_eq!(run::<Reverse>(b"").await.unwrap(), b"");
    }

    #[tokio::test]
    async fn output_larger_than_pipe_buffer() {
        let input: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut expected = input.clone();
        expected.reverse();
        assert_eq!(run::<Reverse>(&input).await.unwrap(), expected);
    }
}
