//! Chat command handler.
//!
//! Answers a single `--query`, or runs an interactive loop over stdin.

use clap::Args;
use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_llm::create_client;
use docqa_rag::{ChatOptions, ChatResponse, LlmGenerator, RagChat, VerificationStatus};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{open_store, print_json};

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

/// Ask questions about indexed documents
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Question to answer; omit for an interactive session
    #[arg(short, long)]
    pub query: Option<String>,

    /// Number of chunks to retrieve
    #[arg(short = 'n', long)]
    pub n_sources: Option<usize>,

    /// Minimum relevance score a chunk needs to ground the answer
    #[arg(long)]
    pub min_relevance: Option<f32>,

    /// Fuzzy-match threshold for quote verification (0.0 - 1.0)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Skip quote verification
    #[arg(long)]
    pub no_verify: bool,

    /// Only search this document
    #[arg(long)]
    pub file: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");
        tracing::debug!("Chat options: {:?}", self);

        let options = self.options(config)?;
        config.validate()?;

        let store = open_store(config)?;

        let endpoint = config
            .get_provider_config(&config.provider)
            .and_then(|pc| pc.endpoint());
        let api_key = config.resolve_api_key(&config.provider);
        let client = create_client(&config.provider, endpoint, api_key.as_deref())
            .map_err(AppError::Config)?;
        let generator = LlmGenerator::new(client, config.model.clone());

        let chat = RagChat::new(Arc::new(store), Arc::new(generator));

        match self.query {
            Some(ref query) => self.answer(&chat, query, &options).await,
            None => self.interactive(&chat, &options).await,
        }
    }

    /// Merge command-line overrides into the configured chat defaults.
    fn options(&self, config: &AppConfig) -> AppResult<ChatOptions> {
        let mut options = ChatOptions::from(&config.chat);

        if let Some(n) = self.n_sources {
            if n == 0 {
                return Err(AppError::Config("--n-sources must be > 0".to_string()));
            }
            options.n_sources = n;
        }
        if let Some(min_relevance) = self.min_relevance {
            options.min_relevance = min_relevance;
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(AppError::Config(format!(
                    "--threshold must be within [0, 1], got {}",
                    threshold
                )));
            }
            options.threshold = threshold;
        }
        if self.no_verify {
            options.verify_quotes = false;
        }
        options.filename_filter = self.file.clone();

        Ok(options)
    }

    async fn answer(&self, chat: &RagChat, query: &str, options: &ChatOptions) -> AppResult<()> {
        let response = chat.chat(query, options).await?;
        if self.json {
            print_json(&response)
        } else {
            print_response(&response);
            Ok(())
        }
    }

    async fn interactive(&self, chat: &RagChat, options: &ChatOptions) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        if !self.json {
            println!("Ask a question about your documents ('quit' to exit).");
        }

        loop {
            stdout.write_all(b"\n> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if EXIT_WORDS.contains(&query.to_lowercase().as_str()) {
                break;
            }

            // One failed question should not end the session.
            if let Err(e) = self.answer(chat, query, options).await {
                tracing::error!("Chat failed: {}", e);
                eprintln!("Error: {}", e);
            }
        }

        Ok(())
    }
}

fn print_response(response: &ChatResponse) {
    println!("\n{}", response.answer);

    if response.refused {
        if let Some(ref reason) = response.refusal_reason {
            println!("\n(refused: {})", reason);
        }
        return;
    }

    if !response.citations.is_empty() {
        println!("\nSources:");
        for (i, citation) in response.citations.iter().enumerate() {
            println!(
                "  [{}] {}, page {} (relevance {:.2})",
                i + 1,
                citation.filename,
                citation.page_number,
                citation.relevance_score
            );
            println!("      \"{}\"", citation.snippet);
        }
    }

    let report = &response.quote_verification;
    println!("\nQuote verification: {}", status_label(report.status));
    if !report.unverified.is_empty() {
        println!("  {} unverified quote(s) removed", report.unverified.len());
    }
}

fn status_label(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::NoQuotes => "no quotes",
        VerificationStatus::Verified => "all quotes verified",
        VerificationStatus::Partial => "partially verified",
        VerificationStatus::Unverified => "unverified",
        VerificationStatus::NoSources => "no sources",
        VerificationStatus::Skipped => "skipped",
    }
}
