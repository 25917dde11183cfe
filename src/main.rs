use clap::{Parser, Subcommand};
use std::path::PathBuf;

use speech_coach::analyzer::{Analyzer, SubprocessAnalyzer};
use speech_coach::config::ServerConfig;
use speech_coach::storage::Storage;

#[derive(Parser, Debug)]
#[command(author, version, about = "Record speech, run it through an analyzer, and serve scored feedback")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file (overrides config file)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Run the configured analyzer on one audio reference and print the result
    Analyze {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// File path, URL or data: URL of the audio
        audio_ref: String,
    },
    /// Print all stored recordings as JSON
    Recordings {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            port,
            database,
        } => {
            let mut config = ServerConfig::load(&config)?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(database) = database {
                config.database_path = database;
            }
            speech_coach::serve::serve(config)
        }
        Command::Analyze { config, audio_ref } => analyze(config, &audio_ref),
        Command::Recordings { config } => list_recordings(config),
    }
}

fn analyze(config_path: PathBuf, audio_ref: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load(&config_path)?;
    let analyzer = SubprocessAnalyzer::new(&config.analyzer);

    let rt = tokio::runtime::Runtime::new()?;
    let fields = rt.block_on(analyzer.analyze(audio_ref))?;
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

fn list_recordings(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load(&config_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    let recordings = rt.block_on(async {
        let pool = speech_coach::db::open_and_init(&config.database_path).await?;
        Storage::new(pool).get_all_recordings().await
    })?;
    println!("{}", serde_json::to_string_pretty(&recordings)?);
    Ok(())
}
