use clap::Parser;
use server::config::{Cli, Command};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(config) => server::serve(&cli.database.db_url, &config).await,
        Command::Seed(args) => {
            let course_id = server::seed(&cli.database.db_url, &args).await?;
            info!(%course_id, "seed complete");
            Ok(())
        }
    }
}
