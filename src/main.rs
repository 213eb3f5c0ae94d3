mod completion;
mod config;
mod orchestrator;
mod transcript;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::Deserialize;
use structopt::StructOpt;
use strum::EnumString;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing_subscriber::EnvFilter;

use completion::ChatCompletionClient;
use config::SessionConfig;
use orchestrator::{RoundEvent, RoundWarning};
use transcript::{Transcript, Turn};

#[derive(Deserialize, Debug)]
struct Environment {
    deepseek_api_key: String,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "persona-roundtable",
    about = "Group chat with several AI-played personas"
)]
struct Args {
    /// Path to the session TOML file (user alias, personas, API settings)
    #[structopt(short = "c", long)]
    config: PathBuf,

    /// Name you go by in the chat, overriding the config file
    #[structopt(short = "u", long)]
    user_alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum Command {
    Clear,
    History,
    Reload,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::from_args();
    dotenv::dotenv().ok();
    let environment = envy::from_env::<Environment>()
        .context("DEEPSEEK_API_KEY environment variable not set")?;
    if environment.deepseek_api_key.trim().is_empty() {
        bail!("DEEPSEEK_API_KEY environment variable is empty");
    }

    let (mut session, mut client) = connect(&args, &environment).await?;
    let mut transcript = Transcript::new();

    print_table(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", session.user_alias);
        std::io::stdout().flush()?;

        let Some(line) = next_input_line(&mut lines)
            .await
            .context("Failed to read from stdin")?
        else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match command.parse::<Command>() {
                Ok(Command::Clear) => {
                    transcript.clear();
                    println!("Conversation cleared.");
                }
                Ok(Command::History) if transcript.is_empty() => println!("Nothing said yet."),
                Ok(Command::History) => transcript.turns().iter().for_each(print_turn),
                Ok(Command::Reload) => match connect(&args, &environment).await {
                    Ok(reloaded) => {
                        (session, client) = reloaded;
                        print_table(&session);
                    }
                    Err(error) => println!("⚠️ Reload failed, keeping current personas: {error:#}"),
                },
                Ok(Command::Quit) => break,
                Err(_) => println!("Unknown command /{command}. Try /clear, /history, /reload or /quit."),
            }
            continue;
        }

        let summary = orchestrator::process_round(
            &session.user_alias,
            line,
            &session.personas,
            &mut transcript,
            &client,
            |event| match event {
                RoundEvent::Turn(turn) => print_turn(turn),
                RoundEvent::Typing(persona) => println!("{} is typing…", persona.name),
                RoundEvent::Warning(RoundWarning::NoPersonas) => {
                    println!("⚠️ Add at least one persona to the config file, then /reload.")
                }
            },
        )
        .await;

        if summary.failed_personas.is_empty() {
            tracing::debug!(turns = summary.turns_appended, "round finished");
        } else {
            tracing::info!(
                turns = summary.turns_appended,
                failed = ?summary.failed_personas,
                "round finished with failed completions"
            );
        }
    }

    Ok(())
}

/// Loads the session file and builds a client for the API it names.
async fn connect(
    args: &Args,
    environment: &Environment,
) -> anyhow::Result<(SessionConfig, ChatCompletionClient)> {
    let mut session = SessionConfig::load(&args.config).await?;
    if let Some(alias) = &args.user_alias {
        session.override_user_alias(alias)?;
    }
    let client = ChatCompletionClient::new(&session.api, environment.deepseek_api_key.clone())?;
    Ok((session, client))
}

/// Next line of input, skipping lines that are not valid UTF-8.
async fn next_input_line<R>(lines: &mut Lines<R>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match lines.next_line().await {
            Err(error) if error.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(%error, "skipping input line that is not valid UTF-8");
                println!("⚠️ That line was not valid UTF-8 and was ignored.");
            }
            other => return other,
        }
    }
}

fn print_table(session: &SessionConfig) {
    let names: Vec<_> = session
        .personas
        .iter()
        .map(|persona| persona.name.as_str())
        .collect();
    println!(
        "You are 『{}』. At the table: {}",
        session.user_alias,
        if names.is_empty() {
            "nobody yet".to_string()
        } else {
            names.join(", ")
        }
    );
}

fn print_turn(turn: &Turn) {
    println!("{}：{}", turn.speaker, turn.content);
}
