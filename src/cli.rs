use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Local development HTTPS server")]
pub struct Args {
    /// Sub‑commands (serve, cert)
    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Ensure a certificate exists, then serve over HTTPS (default)
    Serve {
        #[command(flatten)]
        config: ConfigArgs,

        /// Listen address, overrides `server.bind`
        #[arg(long)]
        bind: Option<String>,

        /// Directory to serve, overrides `server.static_dir`
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Ensure a certificate exists and exit
    Cert {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct ConfigArgs {
    /// Path to configuration file (default: ./devhttps.toml if present)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}
