use certsync::cli::{handle_command, Cli};

#[tokio::main]
async fn main() {
    use clap::Parser;
    let cli = Cli::parse();

    match handle_command(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
