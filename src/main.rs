use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = strangler::cli::Cli::parse();
    if let Err(e) = strangler::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
