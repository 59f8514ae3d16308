//! `copy`: forwards the input unchanged.

use crate::error::StageError;
use crate::stage::{Stage, StageContext, StageKind, StageReader, StageWriter};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct Passthrough {
    input: StageReader,
    output: StageWriter,
}

impl StageKind for Passthrough {
    const NAME: &'static str = "copy";
    const FILE_EXTENSION: &'static str = ".copy";

    fn construct(ctx: StageContext) -> Self {
        Self {
            input: ctx.input,
            output: ctx.output,
        }
    }
}

impl Stage for Passthrough {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>> {
        let Passthrough {
            mut input,
            mut output,
        } = *self;
        async move {
            let copied = tokio::io::copy(&mut input, &mut output).await?;
            output.shutdown().await?;
            debug!("copy: forwarded {} bytes", copied);
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::run;

    #[tokio::test]
    async fn copies_bytes_verbatim() {
        let input = b"<html>\r\n\x00\xffbinary</html>";
        assert_eq!(run::<Passthrough>(input).await.unwrap(), input.to_vec());
    }

    #[tokio::test]
    async fn empty_input_gives_empty_output() {
        assert!(run::<Passthrough>(b"").await.unwrap().is_empty());
    }
}
