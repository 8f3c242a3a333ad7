// Forbid unwrap() in production code.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use explorer::Driver;
use explorer::command::{ParseError, Request};
use explorer::config::ExplorerConfig;
use explorer::output::{Output, OutputFormat};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Requests buffered while an operation plays.
const REQUEST_QUEUE: usize = 64;
const OUTPUT_QUEUE: usize = 256;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "explorer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment variables
    let config = match ExplorerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: order={}, speed={}, delete_policy={}, seed={}",
        config.order,
        config.speed,
        config.delete_policy,
        config.seed
    );

    serve(&config, tokio::io::stdin(), tokio::io::stdout()).await;

    // The stdin reader may still sit in a blocking read that cannot be
    // cancelled, so leave without waiting for the runtime to shut down.
    std::process::exit(0);
}

/// Run the driver over a line-based input and output until either side
/// closes. Returns without waiting for the input reader.
async fn serve<R, W>(config: &ExplorerConfig, input: R, output: W)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
    let (output_tx, output_rx) = mpsc::channel(OUTPUT_QUEUE);

    let reader = tokio::spawn(read_requests(input, request_tx));
    let writer = tokio::spawn(write_outputs(output, output_rx, config.output));

    Driver::new(config).run(request_rx, output_tx).await;

    reader.abort();
    if let Err(e) = writer.await {
        tracing::error!("Output writer failed: {e}");
    }
}

/// Parse input lines into requests. Blank lines are skipped.
async fn read_requests<R>(input: R, requests: mpsc::Sender<Result<Request, ParseError>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("input closed");
                return;
            }
            Err(e) => {
                tracing::warn!("input read error: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if requests.send(line.parse()).await.is_err() {
            return;
        }
    }
}

async fn write_outputs<W>(mut output: W, mut outputs: mpsc::Receiver<Output>, format: OutputFormat)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outputs.recv().await {
        let line = match item.render(format) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("failed to render output: {e}");
                continue;
            }
        };
        if let Err(e) = write_line(&mut output, &line).await {
            tracing::debug!("output closed: {e}");
            return;
        }
    }
}

async fn write_line<W>(output: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, duplex};

    use super::*;

    fn config() -> ExplorerConfig {
        ExplorerConfig {
            output: OutputFormat::Text,
            skip_delays: true,
            ..ExplorerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_serve_until_input_ends() {
        let (mut input, input_end) = duplex(1024);
        let (output_end, mut output) = duplex(64 * 1024);

        input.write_all(b"insert 5\n\nbogus\n").await.unwrap();
        drop(input);
        serve(&config(), input_end, output_end).await;

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        assert!(text.contains("Inserted 5 into new root"), "{text}");
        assert!(text.contains("unknown request: 'bogus'"), "{text}");
    }

    #[tokio::test]
    async fn test_serve_returns_while_input_stays_open() {
        let (mut input, input_end) = duplex(1024);
        let (output_end, output) = duplex(1024);
        drop(output);

        input.write_all(b"stats\n").await.unwrap();
        // Output is gone but the input never reaches end of file
        serve(&config(), input_end, output_end).await;
        drop(input);
    }
}
