use clap::Parser;
use restbridge::app::App;
use std::path::PathBuf;

/// Exposes configured REST API operations as tools over stdio JSON-RPC.
#[derive(Debug, Parser)]
#[command(name = "restbridge", version, about)]
struct Cli {
    /// Path to the API configuration (defaults to $RESTBRIDGE_CONFIG).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the generated tool catalogue as JSON and exit.
    #[arg(long, conflicts_with = "check")]
    list_tools: bool,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("restbridge: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::initialize(cli.config)?;

    if cli.list_tools {
        let tools = app.tool_executor.tools();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }
    if cli.check {
        eprintln!(
            "restbridge: configuration OK ({} tools)",
            app.tool_executor.generator().len()
        );
        return Ok(());
    }

    app.server().run_stdio().await?;
    Ok(())
}
