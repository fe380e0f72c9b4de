use clap::{Parser, Subcommand};
use graph_copilot::app::App;
use graph_copilot::errors::ToolError;
use graph_copilot::mcp::server::run_stdio;
use graph_copilot::services::copilot::Outcome;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "graph-copilot")]
#[command(about = "Natural-language copilot for the Microsoft Graph API")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the MCP tools over stdio (default)
    Serve,
    /// Answer a question: synthesize a URL, call Graph, stream the explanation
    Ask { query: String },
    /// Print the Graph URL synthesized for a question
    Url { query: String },
    /// Invoke one tool with JSON arguments and print the result
    Call {
        tool: String,
        #[arg(default_value = "{}")]
        args: String,
    },
}

async fn run(args: Args) -> Result<(), ToolError> {
    let app = Arc::new(App::initialize()?);
    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_stdio(app).await,
        Command::Ask { query } => {
            let copilot = app.runtime.copilot();
            let mut stdout = std::io::stdout();
            let report = copilot
                .ask(&query, |chunk| {
                    let _ = stdout.write_all(chunk.as_bytes());
                    let _ = stdout.flush();
                })
                .await?;
            println!();
            eprintln!("url: {}", report.url);
            if let Outcome::Suggestion(suggestion) = &report.outcome {
                eprintln!("request failed: {}", suggestion.error);
            }
            Ok(())
        }
        Command::Url { query } => {
            let synthesized = app.runtime.copilot().try_synthesize(&query).await?;
            println!("{}", synthesized.url);
            Ok(())
        }
        Command::Call { tool, args } => {
            let args: serde_json::Value = serde_json::from_str(&args).map_err(|err| {
                ToolError::invalid_params(format!("args must be a JSON object: {}", err))
            })?;
            let payload = app.tool_executor.execute(&tool, args).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).unwrap_or_default()
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run(Args::parse()).await {
        eprintln!("graph-copilot: {}", err);
        if let Some(hint) = &err.hint {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}
