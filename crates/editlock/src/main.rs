//! Editlock CLI - edit-lock coordinator and expiry sweeper
//!
//! Binary name: `editlock`

use std::process;

use editlock::cli::{
    build_cli,
    handlers::{dispatch, exit_code, format_error},
};

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries JSON only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();

    let code = match dispatch(&matches).await {
        Ok(code) => code,
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {}", format_error(&err));
            }
            exit_code(&err)
        }
    };

    if code != 0 {
        #[allow(clippy::exit)]
        process::exit(code);
    }
}
