use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use brrtweb::config::AppConfig;
use brrtweb::context::Handler;
use brrtweb::logging::{init_logging, LogConfig, LogFormat};
use brrtweb::middleware::CorsMiddleware;
use brrtweb::runtime_config::RuntimeConfig;
use brrtweb::session::{self, MemoryProvider, SessionConfig, SessionListener};
use brrtweb::{App, Context, Error, Group, RestController, Router};
use clap::Parser;
use serde_json::json;
use tracing::info;

/// Demo server for the brrtweb framework
#[derive(Parser)]
#[command(name = "brrtweb")]
#[command(about = "brrtweb demo server", long_about = None)]
struct Cli {
    /// YAML or TOML configuration file
    #[arg(short, long, env = "BRRTWEB_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log output format: json or pretty
    #[arg(long)]
    log_format: Option<String>,
}

struct Users;

impl RestController for Users {
    fn prefix(&self) -> &str {
        "/users"
    }

    fn list(&self) -> Option<Handler> {
        Some(Arc::new(|ctx: &mut Context| {
            ctx.json(&json!([{ "id": 1, "name": "ada" }, { "id": 2, "name": "grace" }]))
        }))
    }

    fn get(&self) -> Option<Handler> {
        Some(Arc::new(|ctx: &mut Context| {
            let id = ctx.int_key()?;
            ctx.json(&json!({ "id": id }))
        }))
    }

    fn delete(&self) -> Option<Handler> {
        Some(Arc::new(|ctx: &mut Context| {
            ctx.status(204);
            Ok(())
        }))
    }
}

fn build_app(config: AppConfig) -> App {
    let mut api = Router::new();
    api.get("/echo/{word}", |ctx| {
        let word = ctx.param("word");
        ctx.text(&word);
        Ok(())
    })
    .post("/echo", |ctx| {
        let body: serde_json::Value = ctx.bind_json()?;
        ctx.json(&body)
    })
    .get("/fail", |_ctx| Err(Error::custom("demo failure")));

    let mut app = App::with_config(config);
    app.use_session(
        Arc::new(MemoryProvider::new()),
        SessionConfig::default(),
        SessionListener::new(),
    )
    .use_logger()
    .use_recovery()
    .use_cors(CorsMiddleware::new())
    .add_group(Group::new("/api", vec![api]))
    .controller(&Users)
    .get("/", |ctx| {
        let visits = session::current(ctx)
            .map(|s| {
                let n = s.get("visits").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                s.set("visits", json!(n));
                n
            })
            .unwrap_or(0);
        ctx.text(&format!("hello from brrtweb, visit {visits}"));
        Ok(())
    });
    app
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if let Some(format) = cli.log_format.as_deref() {
        log_config.format = LogFormat::parse(format);
    }
    init_logging(&log_config)?;
    RuntimeConfig::from_env().apply();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let addr = config.server.address();
    let app = build_app(config);
    let handle = app.start(addr.as_str()).context("starting server")?;
    info!(addr = %handle.local_addr(), "brrtweb demo listening");

    wait_for_shutdown()?;
    info!("Shutdown signal received");
    handle.stop();
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown() -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("registering signal handlers")?;
    let _ = signals.forever().next();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown() -> anyhow::Result<()> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(())
}
