mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use devhttps::config::{self, Config};
use devhttps::server;
use devhttps::tls::{self, BootstrapOutcome};
use log::{error, info};

fn main() {
    // Handshake failures from browsers that do not trust the dev certificate
    // are expected; keep rustls quiet unless RUST_LOG says otherwise.
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .filter_module("rustls", log::LevelFilter::Error)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Args::parse();

    match args.sub.unwrap_or(cli::Cmd::Serve {
        config: cli::ConfigArgs::default(),
        bind: None,
        static_dir: None,
    }) {
        cli::Cmd::Serve {
            config,
            bind,
            static_dir,
        } => {
            let mut cfg = config::load(config.config.as_deref())?;
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            if let Some(dir) = static_dir {
                cfg.server.static_dir = dir;
            }
            run_server(cfg).await
        }
        cli::Cmd::Cert { config } => {
            let cfg = config::load(config.config.as_deref())?;
            handle_cert(&cfg).await
        }
    }
}

/// Certificate bootstrap must succeed before the listener binds.
async fn run_server(cfg: Config) -> Result<()> {
    bootstrap_certificate(&cfg).await?;
    server::serve(&cfg).await
}

async fn handle_cert(cfg: &Config) -> Result<()> {
    let outcome = bootstrap_certificate(cfg).await?;
    print_path("certificate", &cfg.tls.cert_path);
    print_path("private key", &cfg.tls.key_path);
    if let BootstrapOutcome::Generated(identities) = outcome {
        println!("valid for: localhost {identities}");
    }
    Ok(())
}

fn print_path(label: &str, path: &Path) {
    let shown = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    println!("{label}: {}", shown.display());
}

/// RSA key generation is CPU-bound, so it runs on the blocking pool.
async fn bootstrap_certificate(cfg: &Config) -> Result<BootstrapOutcome> {
    let tls_cfg = cfg.tls.clone();
    let outcome = tokio::task::spawn_blocking(move || tls::ensure_certificate(&tls_cfg))
        .await
        .context("Certificate bootstrap task panicked")?
        .context("Failed to generate certificate")?;

    if outcome == BootstrapOutcome::KeptPartial {
        info!("Continuing with incomplete certificate pair as configured");
    }
    Ok(outcome)
}
