//! Perceptor operator CLI.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use perceptor_cli::cli::Cli;
use perceptor_cli::commands;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 로그는 stderr로 보내 stdout의 JSON 출력과 섞이지 않게 합니다.
    let default_level = cli.log_level.as_deref().unwrap_or("warn");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout();
    if let Err(e) = commands::run(cli, &mut stdout).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
