use clap::Parser;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = apt_exporter::cli::Cli::parse();
    apt_exporter::run_app(args).await
}
