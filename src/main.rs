//! financial-bot - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use financial_bot::cli::{Args, Commands};
use financial_bot::config::Config;
use financial_bot::llm::OllamaGenerator;
use financial_bot::rag::ChatHistory;
use financial_bot::vector_db::QdrantStore;
use financial_bot::{logging, FinancialBot, Query};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate()?;

    logging::init(&config.logging);

    match &args.command {
        Commands::Ask {
            question,
            about_me,
            chat_history,
            show_context,
        } => {
            let bot = build_bot(&config)?;
            let query = Query::new(about_me.clone(), question.clone(), chat_history.clone());

            let pb = spinner("Thinking...");
            let result = bot.ask(&query).await;
            pb.finish_and_clear();
            let reply = result?;

            if *show_context {
                println!("{}", "Context:".bright_cyan().bold());
                println!("{}", reply.context.text.trim_end());
                println!();
            }
            println!("{}", reply.answer.text);
        }

        Commands::Chat { about_me } => {
            let bot = build_bot(&config)?;
            run_chat(&bot, &config, about_me).await?;
        }

        Commands::Health => {
            let mut healthy = true;

            let generator = OllamaGenerator::new(&config.llm)?;
            if generator.health_check().await {
                println!(
                    "{} Ollama reachable at {} (model {})",
                    "✓".green(),
                    generator.base_url(),
                    generator.model()
                );
            } else {
                healthy = false;
                println!(
                    "{} Ollama not reachable at {}. Start with: ollama serve",
                    "✗".red(),
                    generator.base_url()
                );
            }

            let store = QdrantStore::connect(&config.vector_store)?;
            let collection = &config.vector_store.collection;
            match store.has_collection(collection).await {
                Ok(true) => println!(
                    "{} Qdrant collection '{}' found at {}",
                    "✓".green(),
                    collection,
                    store.url()
                ),
                Ok(false) => {
                    healthy = false;
                    println!(
                        "{} Qdrant at {} has no collection '{}'",
                        "✗".red(),
                        store.url(),
                        collection
                    );
                }
                Err(e) => {
                    healthy = false;
                    println!("{} {}", "✗".red(), e);
                }
            }

            if !healthy {
                std::process::exit(1);
            }
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)
                .context("Failed to render configuration")?;
            if let Some(path) = Config::default_path() {
                println!("{} {}", "#".dimmed(), path.display().to_string().dimmed());
            }
            println!("{}", rendered);
        }
    }

    Ok(())
}

fn build_bot(config: &Config) -> Result<FinancialBot> {
    let pb = spinner("Loading embedding model...");
    let bot = FinancialBot::from_config(config);
    pb.finish_and_clear();
    bot.context("Failed to initialize pipeline")
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Interactive loop; recent turns are fed back as chat history
async fn run_chat(bot: &FinancialBot, config: &Config, about_me: &str) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut history = ChatHistory::new(config.history.window);

    println!(
        "{} Ask a financial question. /clear resets history, Ctrl-D exits.",
        "financial-bot".bright_cyan().bold()
    );

    loop {
        let line = match editor.readline(">financial-bot: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(question);

        if question == "/clear" {
            history.clear();
            println!("{}", "History cleared.".dimmed());
            continue;
        }

        let query = Query::new(about_me, question, history.render());
        let pb = spinner("Thinking...");
        let result = bot.ask(&query).await;
        pb.finish_and_clear();

        match result {
            Ok(reply) => {
                println!("{}\n", reply.answer.text);
                history.push(question, reply.answer.text);
            }
            Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
        }
    }

    Ok(())
}
