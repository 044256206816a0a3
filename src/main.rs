use anyhow::{anyhow, bail, Context};
use clap::Parser;
use http::{HeaderName, HeaderValue, StatusCode};
use jpeg_body_filter::config::{CompiledConfig, Config, FilterHandle};
use jpeg_body_filter::logging::{self, LogFormat};
use jpeg_body_filter::pipeline::{
    Chunk, CollectingSink, Exchange, FilterChain, RequestContext, ResponseHead,
};
use jpeg_body_filter::JpegFilter;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Run a JPEG response body through the filter chain, as a server would
#[derive(Parser, Debug)]
#[command(name = "jpeg-filter")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "filter.yaml")]
    config: PathBuf,

    /// Request path used for route lookup
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Response body to filter ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Where to write the emitted body ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Body chunk size fed to the filter
    #[arg(long, default_value_t = 8192)]
    chunk_size: usize,

    /// Query argument visible to expressions, as key=value (repeatable)
    #[arg(long = "arg", value_parser = parse_arg)]
    args: Vec<(String, String)>,

    /// Request header visible to expressions, as Name:value (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Validate configuration and exit
    #[arg(long)]
    check: bool,

    /// Log output format (text or json)
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

fn parse_arg(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected Name:value, got '{}'", s))
}

fn read_input(input: &str) -> anyhow::Result<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read stdin")?;
        return Ok(data);
    }
    std::fs::read(input).with_context(|| format!("Failed to read input file '{}'", input))
}

fn write_output(output: &str, body: &[u8]) -> anyhow::Result<()> {
    if output == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(body).context("Failed to write stdout")?;
        return stdout.flush().context("Failed to flush stdout");
    }
    std::fs::write(output, body).with_context(|| format!("Failed to write output file '{}'", output))
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::from_file(&args.config).map_err(|e| anyhow!(e))?;
    let compiled = CompiledConfig::compile(&config).map_err(|e| anyhow!(e))?;

    tracing::info!(
        config_file = %args.config.display(),
        routes = compiled.router().len(),
        "Configuration loaded successfully"
    );

    if args.check {
        println!("configuration ok: {} route(s)", compiled.router().len());
        return Ok(());
    }
    if args.chunk_size == 0 {
        bail!("--chunk-size must be greater than 0");
    }

    let filter = Arc::new(JpegFilter::new(FilterHandle::new(compiled)));
    let chain = FilterChain::new().with(filter.clone());

    let mut ctx = RequestContext::from_target("GET", &args.path);
    for (key, value) in &args.args {
        ctx.set_query_param(key, value);
    }
    for (name, value) in &args.headers {
        ctx.set_header(name, value);
    }
    let request_id = ctx.request_id().to_string();

    let body = read_input(&args.input)?;
    let mut head = ResponseHead::new(StatusCode::OK);
    head.set_content_length(body.len());
    head.headers.insert(
        HeaderName::from_static("content-type"),
        HeaderValue::from_static("application/octet-stream"),
    );

    let pieces: Vec<&[u8]> = body.chunks(args.chunk_size).collect();
    let count = pieces.len();
    let chunks = pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk::new(piece.to_vec(), i + 1 == count));

    let mut exchange = Exchange::new(ctx);
    let mut sink = CollectingSink::new();
    let mut outcome = chain
        .run(&mut exchange, head, chunks, &mut sink)
        .map_err(|e| anyhow!("HTTP {}: {}", e.to_http_status(), e))?;
    if count == 0 {
        outcome = chain
            .body(&mut exchange, Some(Chunk::eos()), &mut sink)
            .map_err(|e| anyhow!("HTTP {}: {}", e.to_http_status(), e))?;
    }
    exchange.teardown();

    if !sink.is_complete() {
        bail!("filter did not complete the response (last outcome {:?})", outcome);
    }

    tracing::info!(
        request_id = %request_id,
        input_len = body.len(),
        output_len = sink.body().len(),
        content_type = sink.head().and_then(|h| h.content_type()).unwrap_or("-"),
        outstanding_buffers = filter.ledger().outstanding(),
        "Response filtered"
    );

    write_output(&args.output, sink.body())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init_subscriber(args.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args) {
        tracing::error!(error = %format!("{:#}", e), "jpeg-filter failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
