//! RapidText CLI - fetch text from URLs and files, or run the download relay

use clap::{Parser, Subcommand, ValueEnum};
use rapidtext::{ContentFetcher, FetchError, FetchOutcome, ProxyGateway, PROXY_ROUTE};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Output format for fetched text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The text alone
    #[default]
    Text,
    /// The full outcome as JSON
    Json,
}

/// RapidText - text acquisition for reading apps
#[derive(Parser, Debug)]
#[command(name = "rapidtext")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a URL and print its text
    Fetch {
        /// URL to fetch
        url: String,

        /// Fetch through this relay instead of directly, e.g. https://reader.example.com/api/proxy
        #[arg(long)]
        proxy: Option<String>,

        /// Output format
        #[arg(long, short, default_value = "text")]
        output: OutputFormat,

        /// Custom User-Agent
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Read a local PDF or text file and print its text
    File {
        /// Path to the file
        path: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "text")]
        output: OutputFormat,
    },
    /// Run the download relay
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8788")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            url,
            proxy,
            output,
            user_agent,
        } => run_fetch(&url, proxy, output, user_agent).await,
        Commands::File { path, output } => run_file(&path, output).await,
        Commands::Serve { bind } => run_serve(bind).await,
    }
}

async fn run_fetch(
    url: &str,
    proxy: Option<String>,
    output: OutputFormat,
    user_agent: Option<String>,
) {
    let fetcher = build_fetcher(proxy, user_agent).unwrap_or_else(|e| exit_with(&e));
    let outcome = fetcher.fetch_text(url).await;
    print_outcome(&outcome, output);
}

/// Build the fetcher for `fetch`; with a relay, every request goes through it
fn build_fetcher(
    proxy: Option<String>,
    user_agent: Option<String>,
) -> Result<ContentFetcher, FetchError> {
    let mut builder = ContentFetcher::builder();
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(endpoint) = proxy {
        builder = builder.proxy_endpoint(endpoint).always_relay(true);
    }
    builder.build()
}

async fn run_file(path: &Path, output: OutputFormat) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let fetcher = ContentFetcher::new().unwrap_or_else(|e| exit_with(&e));
    let outcome = fetcher.read_local(bytes, &filename).await;
    print_outcome(&outcome, output);
}

async fn run_serve(bind: SocketAddr) {
    let gateway = ProxyGateway::new().unwrap_or_else(|e| exit_with(&e));
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: cannot bind {}: {}", bind, e);
            std::process::exit(1);
        }
    };

    info!(addr = %bind, route = PROXY_ROUTE, "Relay listening");
    if let Err(e) = axum::serve(listener, gateway.router()).await {
        eprintln!("Error: server failed: {}", e);
        std::process::exit(1);
    }
}

/// Print the outcome; failures go to stderr with exit code 1
fn print_outcome(outcome: &FetchOutcome, output: OutputFormat) {
    if output == OutputFormat::Json {
        writeln_safe(&format_json(outcome));
    }
    match outcome {
        FetchOutcome::Text { content } => {
            if output == OutputFormat::Text {
                writeln_safe(content);
            }
        }
        FetchOutcome::Failure { message, .. } => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
    }
}

fn format_json(outcome: &FetchOutcome) -> String {
    serde_json::to_string_pretty(outcome).unwrap_or_else(|e| {
        eprintln!("Error serializing outcome: {}", e);
        std::process::exit(1);
    })
}

fn exit_with(e: &FetchError) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rapidtext::ErrorKind;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::parse_from([
            "rapidtext",
            "fetch",
            "https://example.com/a.pdf",
            "--proxy",
            "https://reader.example.com/api/proxy",
            "-o",
            "json",
        ]);
        match cli.command {
            Commands::Fetch {
                url,
                proxy,
                output,
                user_agent,
            } => {
                assert_eq!(url, "https://example.com/a.pdf");
                assert_eq!(proxy.as_deref(), Some("https://reader.example.com/api/proxy"));
                assert_eq!(output, OutputFormat::Json);
                assert!(user_agent.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_proxy_flag_routes_through_relay() {
        let fetcher = build_fetcher(
            Some("https://reader.example.com/api/proxy".to_string()),
            None,
        )
        .unwrap();
        let debug = format!("{fetcher:?}");
        assert!(debug.contains("always_relay: true"), "{debug}");

        let fetcher = build_fetcher(None, Some("ReaderTest/2.0".to_string())).unwrap();
        assert!(format!("{fetcher:?}").contains("always_relay: false"));
    }

    #[test]
    fn test_bad_proxy_endpoint_rejected() {
        let err = build_fetcher(Some("not a url".to_string()), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_parse_serve_default_bind() {
        let cli = Cli::parse_from(["rapidtext", "serve"]);
        match cli.command {
            Commands::Serve { bind } => assert_eq!(bind.to_string(), "127.0.0.1:8788"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_file_default_output() {
        let cli = Cli::parse_from(["rapidtext", "file", "notes/paper.pdf"]);
        match cli.command {
            Commands::File { path, output } => {
                assert_eq!(path, PathBuf::from("notes/paper.pdf"));
                assert_eq!(output, OutputFormat::Text);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_format_json_failure() {
        let outcome = FetchOutcome::Failure {
            kind: ErrorKind::BlockedHost,
            message: "Blocked host: Blocked host".to_string(),
        };
        let json = format_json(&outcome);

        assert!(json.contains("\"status\": \"failure\""));
        assert!(json.contains("\"kind\": \"blocked_host\""));
    }

    #[test]
    fn test_format_json_text() {
        let outcome = FetchOutcome::Text {
            content: "Hello".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&format_json(&outcome)).unwrap();

        assert_eq!(value["status"], "text");
        assert_eq!(value["content"], "Hello");
    }
}
