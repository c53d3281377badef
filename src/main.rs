use clap::Parser;

use deskpilot::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = deskpilot::run(cli).await {
        eprintln!("deskpilot: {e}");
        std::process::exit(1);
    }
}
