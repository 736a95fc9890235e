mod app;
mod config;
mod error;
mod server;

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use runtime::ToolHost;
use runtime::tools::sql;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{CONFIG_FILE, Config};
use error::Result;
use server::ServerState;

#[derive(Parser)]
#[command(name = "anhelados")]
#[command(about = "Chispitas, the Anhelados support assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal
    Chat,
    /// Serve the web chat
    Serve {
        /// Listen address (defaults to server.addr)
        #[arg(short, long)]
        addr: Option<SocketAddr>,
    },
    /// List the tools offered to the model
    Tools,
    /// Print the database schema as the assistant sees it
    Schema,
    /// Run one statement through the SQLQuery tool
    Query {
        /// The SQL statement
        sql: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&cli.config)?;
    let app = App::new(config)?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&app).await,
        Some(Commands::Serve { addr }) => cmd_serve(&app, addr).await,
        Some(Commands::Tools) => {
            cmd_tools(&app);
            Ok(())
        }
        Some(Commands::Schema) => cmd_schema(&app),
        Some(Commands::Query { sql }) => cmd_query(&app, &sql).await,
    }
}

async fn cmd_chat(app: &App) -> Result<()> {
    let backend = app.backend()?;
    let mut session = app.session(backend);

    println!("Chatbot de Anhelados v{}", env!("CARGO_PKG_VERSION"));
    println!("Database: {}", app.store.path().display());
    println!("Model: {}", app.config.backend.model);
    println!("Escribe tu consulta. 'quit' o Ctrl+D para salir.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("👩‍💻 > ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.chat(input).await {
            Ok(reply) => println!("\n🍦 {reply}\n"),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    let usage = session.usage();
    info!(
        session = %session.id,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "session ended"
    );
    println!("\n¡Gracias por tu preferencia!");
    Ok(())
}

async fn cmd_serve(app: &App, addr: Option<SocketAddr>) -> Result<()> {
    let backend = app.backend()?;
    let state = Arc::new(ServerState::new(
        backend,
        Arc::clone(&app.tools),
        app.config.agent.max_iterations,
        app.config.server.limits(),
    ));

    let addr = addr.unwrap_or(app.config.server.addr);
    let listener = TcpListener::bind(addr).await?;
    println!("Chatbot de Anhelados listening on http://{}", listener.local_addr()?);

    server::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

fn cmd_tools(app: &App) {
    for spec in app.tools.specs() {
        println!("{}: {}", spec.name, spec.description);
        let properties = spec.schema["properties"].as_object();
        for (name, property) in properties.into_iter().flatten() {
            println!(
                "    {name} ({}): {}",
                property["type"].as_str().unwrap_or("any"),
                property["description"].as_str().unwrap_or_default()
            );
        }
    }
}

fn cmd_schema(app: &App) -> Result<()> {
    let schema = app.schema()?;
    if schema.is_empty() {
        println!("No tables found in {}", app.store.path().display());
    } else {
        println!("{schema}");
    }
    Ok(())
}

async fn cmd_query(app: &App, statement: &str) -> Result<()> {
    let tool = runtime::SqlQueryTool::new(app.store.clone(), app.config.policy.clone());
    let outcome = tool.run(statement).await;
    match sql::render(&outcome) {
        Value::String(text) => println!("{text}"),
        rows => println!("{rows}"),
    }
    Ok(())
}
