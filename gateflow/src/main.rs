// gateflow CLI
//
// Runs the preset pipelines against an OpenAI-compatible endpoint configured
// through the environment (or a `.env` file).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use gateflow::cancellation::CancellationToken;
use gateflow::config::{AppConfig, WeatherConfig, DEFAULT_MODEL_PREFIX};
use gateflow::core::{PipelineRun, RunStatus, QUALITY_FLAG};
use gateflow::events::LoggingEventSink;
use gateflow::observability::init_logging;
use gateflow::persist::TextRunStore;
use gateflow::pipeline::RunOptions;
use gateflow::providers::{
    AmapWeatherClient, ChatCompletionGenerator, ChatDecisionValidator, DuckDuckGoSearch,
    SearchGenerator, WeatherGenerator,
};
use gateflow::utils::current_month;
use gateflow::workflows::{self, prompts};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "gateflow")]
#[command(about = "Run generate-and-gate text pipelines")]
#[command(version)]
struct Cli {
    /// Prefix of the model environment variables (e.g. OPENAI, OLLAMA)
    #[arg(long, global = true, env = "GATEFLOW_MODEL_PREFIX", default_value = DEFAULT_MODEL_PREFIX)]
    model_prefix: String,

    /// Directory for saved stories (overrides GATEFLOW_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Outline a story, check it is science fiction, then write it
    Story {
        /// What the story should be about (read from stdin if omitted)
        prompt: Option<String>,

        /// Do not save the finished story
        #[arg(long)]
        no_save: bool,
    },

    /// Search this month's news on a topic and edit it into articles
    News {
        /// Topic to search for
        topic: String,
    },

    /// Answer a message in the language it was written in
    Translate {
        /// Message to answer (read from stdin if omitted)
        message: Option<String>,
    },

    /// Plan a week of meals
    MealPlan {
        /// What the plan should cover (a vegetarian muscle-building week if omitted)
        request: Option<String>,
    },

    /// Look up the weather for a city in China
    Weather {
        /// City name, e.g. 北京
        city: String,

        /// Only fetch today's conditions
        #[arg(long)]
        brief: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let seed = match &cli.command {
        Command::Story { prompt: Some(p), .. } => p.clone(),
        Command::Story { prompt: None, .. } => read_prompt("What kind of story do you want? ")?,
        Command::News { topic } => topic.clone(),
        Command::Translate { message: Some(m) } => m.clone(),
        Command::Translate { message: None } => read_prompt("Message: ")?,
        Command::MealPlan { request } => request
            .clone()
            .unwrap_or_else(|| workflows::MEAL_PLAN_REQUEST.to_string()),
        Command::Weather { city, .. } => city.clone(),
    };
    if seed.trim().is_empty() {
        println!("The prompt cannot be empty. Run the program again with a valid prompt.");
        return Ok(());
    }

    let mut config = AppConfig::from_env(&cli.model_prefix)
        .with_context(|| format!("loading {} model configuration", cli.model_prefix))?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    init_logging(&config.log).context("initializing logging")?;
    if let Some(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }
    info!(model = ?config.model, "Configuration loaded");

    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping before the next stage");
            watcher.cancel("interrupted by user");
        }
    });
    let options = RunOptions::new().with_cancellation(token);

    match cli.command {
        Command::Story { no_save, .. } => run_story(&config, &seed, no_save, &options).await,
        Command::News { .. } => run_news(&config, &seed, &options).await,
        Command::Translate { .. } => run_translate(&config, &seed, &options).await,
        Command::MealPlan { .. } => run_meal_plan(&config, &seed, &options).await,
        Command::Weather { brief, .. } => run_weather(&config, &seed, brief, &options).await,
    }
}

fn read_prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run_story(config: &AppConfig, prompt: &str, no_save: bool, options: &RunOptions) -> Result<()> {
    let model = &config.model;
    let pipeline = workflows::story_pipeline(
        Arc::new(ChatCompletionGenerator::new(model.clone(), prompts::STORY_OUTLINER)),
        Arc::new(ChatDecisionValidator::new(
            model.clone(),
            prompts::OUTLINE_CHECKER,
            [workflows::IS_SCIFI],
        )),
        Arc::new(ChatCompletionGenerator::new(model.clone(), prompts::STORY_WRITER)),
    )?
    .with_event_sink(Arc::new(LoggingEventSink::debug()));

    println!("Generating the story outline...");
    let run = pipeline.run_with(prompt, options).await?;

    if let Some(outline) = run.output_of(workflows::OUTLINE) {
        println!("Outline:\n{outline}\n");
    }

    match run.status() {
        RunStatus::Completed => {
            println!("The outline is good and is science fiction, so the story was written.");
            println!("\nStory:\n{}\n", run.final_output().unwrap_or_default());
            if !no_save {
                let path = TextRunStore::new(&config.output_dir).save(&run)?;
                println!("Story saved to {}", path.display());
            }
            Ok(())
        }
        RunStatus::Halted { .. } => {
            for flag in run.rejection().map(|r| r.unmet.as_slice()).unwrap_or_default() {
                match flag.as_str() {
                    QUALITY_FLAG => println!("The outline is not good enough, stopping here."),
                    workflows::IS_SCIFI => println!("The outline is not science fiction, stopping here."),
                    other => println!("The outline failed the '{other}' check, stopping here."),
                }
            }
            Ok(())
        }
        _ => fail(&run),
    }
}

async fn run_news(config: &AppConfig, topic: &str, options: &RunOptions) -> Result<()> {
    let model = &config.model;
    let search = DuckDuckGoSearch::new().with_timeout(model.timeout.unwrap_or(SEARCH_TIMEOUT));
    let fetcher = SearchGenerator::new(Arc::new(search)).with_query(workflows::news_query);
    let pipeline = workflows::news_pipeline(
        Arc::new(fetcher),
        Arc::new(ChatCompletionGenerator::new(model.clone(), prompts::NEWS_EDITOR)),
    )?
    .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let seed = workflows::news_request(topic, &current_month());
    info!(%seed, "Running news workflow");
    let run = pipeline.run_with(&seed, options).await?;

    print_final(&run)
}

async fn run_translate(config: &AppConfig, message: &str, options: &RunOptions) -> Result<()> {
    let model = &config.model;
    let responder = |instructions| Arc::new(ChatCompletionGenerator::new(model.clone(), instructions));
    let classifier =
        ChatDecisionValidator::new(model.clone(), prompts::LANGUAGE_ROUTER, Vec::<String>::new())
            .with_category(workflows::LANGUAGE, workflows::LANGUAGES);
    let pipeline = workflows::translation_pipeline(
        Arc::new(classifier),
        responder(prompts::FRENCH_RESPONDER),
        responder(prompts::CHINESE_RESPONDER),
        responder(prompts::ENGLISH_RESPONDER),
    )?
    .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let run = pipeline.run_with(message, options).await?;
    print_final(&run)
}

async fn run_meal_plan(config: &AppConfig, request: &str, options: &RunOptions) -> Result<()> {
    let pipeline = workflows::meal_plan_pipeline(Arc::new(ChatCompletionGenerator::new(
        config.model.clone(),
        prompts::MEAL_PLANNER,
    )))?
    .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let run = pipeline.run_with(request, options).await?;
    print_final(&run)
}

async fn run_weather(config: &AppConfig, city: &str, brief: bool, options: &RunOptions) -> Result<()> {
    let weather = WeatherConfig::from_env().context("loading weather configuration")?;
    let client = Arc::new(AmapWeatherClient::new(weather));
    let lookup = if brief {
        WeatherGenerator::brief(client)
    } else {
        WeatherGenerator::new(client)
    };
    let pipeline = workflows::weather_pipeline(
        Arc::new(lookup),
        Arc::new(ChatCompletionGenerator::new(config.model.clone(), prompts::WEATHER_ASSISTANT)),
    )?
    .with_event_sink(Arc::new(LoggingEventSink::debug()));

    let run = pipeline.run_with(city, options).await?;
    if let Some(reading) = run.output_of(workflows::LOOKUP_WEATHER) {
        println!("{reading}\n");
    }
    print_final(&run)
}

fn print_final(run: &PipelineRun) -> Result<()> {
    if run.status().is_completed() {
        println!("{}", run.final_output().unwrap_or_default());
        Ok(())
    } else {
        fail(run)
    }
}

fn fail(run: &PipelineRun) -> Result<()> {
    match run.status() {
        RunStatus::Failed { reason, .. } => bail!("{} run {} failed: {reason}", run.pipeline(), run.run_id()),
        other => bail!("{} run {} ended as {other}", run.pipeline(), run.run_id()),
    }
}
