use clap::Parser;
use ingestor_cli::opt::IngestorCli;

#[tokio::main]
async fn main() {
    match ingestor_cli::run(IngestorCli::parse()).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
