use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "sqlward", version, about = "SQL change-governance gateway")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway, accepting Postgres wire clients.
    Serve {
        /// Gateway configuration file.
        #[arg(long, short, default_value = "sqlward.yaml", env = "SQLWARD_CONFIG")]
        config: PathBuf,
    },

    /// Audit a SQL file against a target without executing it.
    Check {
        /// File of `;`-separated statements.
        file: PathBuf,

        /// Gateway configuration file (rules, timeouts, credentials).
        #[arg(long, short)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3306)]
        port: u16,

        #[arg(long)]
        user: Option<String>,

        #[arg(long, env = "SQLWARD_TARGET_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Print the result table as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Encrypt a target password for use in session markers.
    EncryptPassword {
        plain: String,

        /// Encryption key (inception_password_encrypt_key).
        #[arg(long, env = "SQLWARD_ENCRYPT_KEY", hide_env_values = true)]
        key: String,
    },

    /// List the statement types the gateway classifies.
    Sqltypes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve { config } => commands::serve::serve(config).await?,
        Command::Check {
            file,
            config,
            host,
            port,
            user,
            password,
            json,
        } => {
            let target = commands::check::TargetArgs {
                host,
                port,
                user,
                password,
            };
            commands::check::run(&file, config.as_deref(), target, json).await?
        }
        Command::EncryptPassword { plain, key } => commands::encrypt::run(&plain, &key),
        Command::Sqltypes => commands::sqltypes::run(),
    }

    Ok(())
}
