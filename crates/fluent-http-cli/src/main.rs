//! fluent-http CLI - send one request and print the response
//!
//! Usage:
//!   fh get :8080/health                         GET http://localhost:8080/health
//!   fh get example.com -q page=2 -H accept:text/html
//!   fh post :3000/users --form name=peter --form address=unknown
//!   fh post :3000/users --json '{"name":"peter"}'
//!   fh post :3000/upload --file file=./a.txt
//!   fh delete :3000/users/1 -u admin:secret --timeout 5
//!   fh get example.com --no-redirects -v --log-level debug

use anyhow::{bail, Context, Result};
use clap::Parser;
use fluent_http::{
    BasicAuth, Client, HttpClientConfig, HttpMethod, Logging, Middleware, RedirectPolicy,
    RequestBuilder,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "fh")]
#[command(about = "Send an HTTP request with fluent-http", long_about = None)]
#[command(version)]
struct Cli {
    /// HTTP method (get, post, put, patch, delete, head, options)
    method: String,

    /// Target URL; ":port/path" and "/path" target localhost over plain HTTP
    url: String,

    /// Header to set, as name:value (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter, as key=value (repeatable)
    #[arg(short = 'q', long = "query")]
    queries: Vec<String>,

    /// Form field, as key=value (repeatable)
    #[arg(long = "form", conflicts_with_all = ["json", "text", "file"])]
    form: Vec<String>,

    /// JSON body text
    #[arg(long, conflicts_with_all = ["text", "file"])]
    json: Option<String>,

    /// Plain text body
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// File upload, as field=path
    #[arg(long)]
    file: Option<String>,

    /// Basic auth credentials, as user:password
    #[arg(short = 'u', long = "user")]
    user: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Maximum redirects to follow
    #[arg(long, default_value_t = 10, conflicts_with = "no_redirects")]
    max_redirects: usize,

    /// Return redirect responses instead of following them
    #[arg(long)]
    no_redirects: bool,

    /// Log request and response bodies
    #[arg(long)]
    trace_bodies: bool,

    /// Print the status line and response headers
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let client = build_client(&cli)?;
    let method: HttpMethod = cli.method.parse()?;
    let builder = apply_options(client.request(method, &cli.url), &cli)?;

    let response = match builder.send().await {
        Ok(response) => response,
        Err(failure) => {
            bail!(
                "{} {} failed: {}",
                failure.response.request.method,
                failure.response.request.url,
                failure.error.sanitized_message()
            )
        }
    };

    if cli.verbose {
        eprintln!("{} {} ({}ms)", response.version, response.status_code, response.latency_ms);
        for (name, value) in response.headers.iter() {
            eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
        eprintln!();
    }

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(response.bytes())
        .context("Failed to write response body")?;
    stdout.flush().ok();

    if !response.is_success() && !response.is_redirect() {
        std::process::exit(22);
    }
    Ok(())
}

fn build_client(cli: &Cli) -> Result<Client> {
    let policy = if cli.no_redirects {
        RedirectPolicy::Stop
    } else {
        RedirectPolicy::Follow {
            max: cli.max_redirects,
        }
    };
    let config = HttpClientConfig::new().redirect_policy(policy);

    let mut middlewares: Vec<Arc<dyn Middleware>> = Vec::new();
    if let Some(user) = &cli.user {
        let (name, password) = split_pair(user, ':').context("--user expects user:password")?;
        middlewares.push(Arc::new(BasicAuth::new(name, password)?));
    }
    if cli.trace_bodies {
        middlewares.push(Arc::new(Logging::new()));
    }

    Ok(Client::with_middlewares(config, middlewares)?)
}

fn apply_options(mut builder: RequestBuilder, cli: &Cli) -> Result<RequestBuilder> {
    for header in &cli.headers {
        let (name, value) = split_pair(header, ':')
            .with_context(|| format!("header {:?} expects name:value", header))?;
        builder = builder.add_header(name, value.trim_start());
    }
    for query in &cli.queries {
        let (key, value) = split_pair(query, '=')
            .with_context(|| format!("query {:?} expects key=value", query))?;
        builder = builder.query(key, value);
    }

    if !cli.form.is_empty() {
        let fields = cli
            .form
            .iter()
            .map(|field| {
                split_pair(field, '=')
                    .with_context(|| format!("form field {:?} expects key=value", field))
            })
            .collect::<Result<Vec<_>>>()?;
        builder = builder.form(fields);
    } else if let Some(json) = &cli.json {
        builder = builder.json(json.as_str());
    } else if let Some(text) = &cli.text {
        builder = builder.text(text.as_str());
    } else if let Some(file) = &cli.file {
        let (field, path) =
            split_pair(file, '=').context("--file expects field=path")?;
        builder = builder.file(field, PathBuf::from(path));
    }

    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::try_from_secs_f64(secs).context("invalid --timeout")?);
    }

    Ok(builder)
}

fn split_pair(input: &str, separator: char) -> Option<(&str, &str)> {
    let (left, right) = input.split_once(separator)?;
    if left.is_empty() {
        return None;
    }
    Some((left, right))
}

/// Initialize logging based on log level
fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized

    Ok(())
}
