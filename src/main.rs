use clap::{Parser, Subcommand};
use colored::Colorize;

use tdauth::{RequestMode, TdConfig, TokenManager};

#[derive(Parser)]
#[command(name = "tdauth", version, about = "OAuth token lifecycle manager for the TD Ameritrade API")]
struct Cli {
    /// Consumer key from the TD app registration portal
    #[arg(long, env = "TDAUTH_CLIENT_ID")]
    client_id: String,

    /// Redirect URI registered with the application
    #[arg(long, env = "TDAUTH_REDIRECT_URI")]
    redirect_uri: String,

    /// Local user name the refresh token is stored under
    #[arg(long, env = "TDAUTH_USER")]
    user: String,

    /// TD account number
    #[arg(long, env = "TDAUTH_ACCOUNT_ID")]
    account_id: String,

    /// Do not persist the refresh token to disk
    #[arg(long)]
    no_store: bool,

    /// Force a full login on every access-token expiry
    #[arg(long)]
    single_access: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and report the session state
    Login,
    /// Print the current bearer token
    Token,
    /// Resolve an endpoint and print the request headers for it
    Headers {
        /// Relative endpoint (e.g. quotes) or absolute URL
        endpoint: String,

        /// Include a JSON content-type header
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TDAUTH_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = TdConfig {
        client_id: cli.client_id,
        redirect_uri: cli.redirect_uri,
        user: cli.user,
        account_id: cli.account_id,
    };

    let mut manager = TokenManager::builder(config)
        .persist_refresh_token(!cli.no_store)
        .single_access(cli.single_access)
        .build()
        .await;

    match cli.command {
        Commands::Login => {
            println!("{manager}");
            if !manager.is_logged_in() {
                eprintln!("{}", "Authentication failed".red());
                std::process::exit(1);
            }
            println!("{}", "Authentication successful".green());
        }
        Commands::Token => match manager.access_token().await {
            Some(token) => println!("{token}"),
            None => {
                eprintln!("{}", "Not logged in".red());
                std::process::exit(1);
            }
        },
        Commands::Headers { endpoint, json } => {
            let mode = if json { RequestMode::Json } else { RequestMode::Default };
            match manager.headers(&endpoint, mode).await {
                Some((url, headers)) => {
                    println!("{url}");
                    for (name, value) in headers.iter() {
                        println!("{name}: {}", value.to_str().unwrap_or("<opaque>"));
                    }
                }
                None => {
                    eprintln!("{}", "Not logged in".red());
                    std::process::exit(1);
                }
            }
        }
    }
}
