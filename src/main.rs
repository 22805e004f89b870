use anyhow::{Context, Result};
use bat::PrettyPrinter;
use clap::Parser;
use cliclack::{input, spinner};
use console::style;
use serde_json::{json, Map, Value};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

use goai::completion_loop::DEFAULT_MAX_ITERATIONS;
use goai::providers::configs::openai::{OpenAiProviderConfig, OPENAI_DEFAULT_HOST};
use goai::providers::openai::OpenAiProvider;
use goai::{
    CompletionLoop, Conversation, LoopOptions, ModelSize, ParameterType, ToolSpec,
    UnknownToolPolicy,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OpenAI API Key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(short, long)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible server (defaults to OPENAI_API_HOST or api.openai.com)
    #[arg(long)]
    host: Option<String>,

    /// Model to use
    #[arg(short, long, conflicts_with = "model_size")]
    model: Option<String>,

    /// Pick a model by size instead of by name
    #[arg(long, value_enum)]
    model_size: Option<ModelSize>,

    /// Sampling temperature between 0 and 2
    #[arg(short, long)]
    temperature: Option<f32>,

    /// System message placed at the start of the conversation
    #[arg(short, long, default_value = "You are a helpful assistant.")]
    system: String,

    /// Maximum completion requests per reply, 0 for no limit
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// How to answer calls to tools that don't exist
    #[arg(long, value_enum, default_value_t = UnknownToolPolicy::Report)]
    unknown_tools: UnknownToolPolicy,

    /// Describe this image URL and exit
    #[arg(long)]
    image: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Get API key from command line or environment variable
    let api_key = cli
        .api_key
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .or_else(|| env::var("OPENAI_TOKEN").ok())
        .context("API key must be provided via --api-key or OPENAI_API_KEY environment variable")?;
    let host = cli
        .host
        .or_else(|| env::var("OPENAI_API_HOST").ok())
        .unwrap_or_else(|| OPENAI_DEFAULT_HOST.to_string());

    let provider = OpenAiProvider::new(OpenAiProviderConfig::new(api_key, host))?;
    let completion_loop = CompletionLoop::new(Box::new(provider)).with_options(LoopOptions {
        max_iterations: (cli.max_iterations > 0).then_some(cli.max_iterations),
        unknown_tool_policy: cli.unknown_tools,
    });

    let mut conversation = Conversation::new();
    if let Some(size) = cli.model_size {
        conversation.set_model_size(size);
    }
    if let Some(model) = &cli.model {
        conversation.set_model_name(model);
    }
    if let Some(temperature) = cli.temperature {
        conversation.set_temperature(temperature)?;
    }
    conversation.append_system_message(&cli.system);

    // the one-shot image description has no tools, so a single reply answers it
    if let Some(image) = &cli.image {
        conversation.append_user_message_with_image("Describe what you see in the image.", image);
        completion_loop.run(&mut conversation)?;
        render_last(&conversation);
        return Ok(());
    }

    conversation.set_tools(demo_tools());

    println!(
        "Example goai CLI ({}) {}",
        conversation.model(),
        style("- type \"exit\" to end the session").dim()
    );
    println!("\n");

    loop {
        let message_text: String = input("Message:").placeholder("").multiline().interact()?;

        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let spin = spinner();
        spin.start("awaiting reply");

        let result = completion_loop.query(&message_text, &mut conversation);

        spin.stop("");

        match result {
            Ok(report) => {
                render_last(&conversation);
                println!(
                    "{}",
                    style(format!(
                        "{} request(s), {} tokens, {} ms",
                        report.requests, report.usage.total_tokens, report.usage.elapsed_ms
                    ))
                    .dim()
                );
            }
            Err(failure) => {
                println!(
                    "{} {}",
                    style("error:").red(),
                    style(failure.to_string()).red()
                );
            }
        }
        println!("\n");
    }
    Ok(())
}

fn demo_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "count_characters",
            "Count the characters in a piece of text",
            count_characters,
        )
        .with_parameter("text", ParameterType::String, "The text to measure"),
        ToolSpec::new(
            "unix_time",
            "Get the current time as seconds since the Unix epoch",
            |_| {
                let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
                Ok(json!({ "unix_time": now.as_secs() }))
            },
        ),
    ]
}

fn count_characters(args: &Map<String, Value>) -> Result<Value> {
    let text = args
        .get("text")
        .and_then(Value::as_str)
        .context("missing string argument 'text'")?;
    Ok(json!({ "characters": text.chars().count() }))
}

fn render_last(conversation: &Conversation) {
    let Some(message) = conversation.last_message() else {
        return;
    };
    let content = message.text();
    if PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .is_err()
    {
        println!("{}", content);
    }
}
