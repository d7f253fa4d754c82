use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use genimg_contracts::chat::{parse_command, ChatCommand, CHAT_HELP};
use genimg_contracts::events::EventWriter;
use genimg_contracts::jobs::{BatchJob, DEFAULT_ASPECT_RATIO, DEFAULT_WORKERS};
use genimg_contracts::{
    Backend, GenError, GenerationIntent, GenerationRequest, ImageHandle, ModelTier,
    PersonPolicy, ResultStatus,
};
use genimg_engine::output::{self, DEFAULT_OUTPUT_DIR};
use genimg_engine::session::{ChatConfig, ChatSession, TurnOutcome};
use genimg_engine::{
    BatchExecutor, DryrunTransport, EditOperation, EditRequest, Generator, HttpTransport,
    Transport,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const HISTORY_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Parser)]
#[command(name = "genimg", version, about = "Image generation over native and batch backends")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Answer every call offline with placeholder images.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate images from a prompt.
    Generate(GenerateArgs),
    /// Edit or combine existing images.
    #[command(subcommand)]
    Edit(EditCommand),
    /// Run many generations from a JSON document.
    Batch(BatchArgs),
    /// Refine an image over several turns.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, short)]
    prompt: String,
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// nano (native) or imagen (batch).
    #[arg(long, default_value = "nano")]
    api: String,
    #[arg(long, short)]
    model: Option<String>,
    #[arg(long, short, default_value = DEFAULT_ASPECT_RATIO)]
    aspect: String,
    #[arg(long, short)]
    size: Option<String>,
    #[arg(long, short = 'n', default_value_t = 1)]
    count: u32,
    #[arg(long)]
    person_gen: Option<String>,
    #[arg(long)]
    with_text: bool,
    #[arg(long)]
    thinking: bool,
    #[arg(long)]
    grounding: bool,
}

#[derive(Debug, Args)]
struct EditCommon {
    #[arg(long, short)]
    input: PathBuf,
    #[arg(long, short)]
    output: PathBuf,
    #[arg(long, short)]
    model: Option<String>,
    #[arg(long)]
    thinking: bool,
}

#[derive(Debug, Subcommand)]
enum EditCommand {
    /// Free-form edit instructions.
    Edit {
        #[command(flatten)]
        common: EditCommon,
        #[arg(long, short)]
        prompt: String,
        #[arg(long, short)]
        aspect: Option<String>,
        #[arg(long, short)]
        size: Option<String>,
        #[arg(long, num_args = 1..)]
        additional: Vec<PathBuf>,
    },
    Style {
        #[command(flatten)]
        common: EditCommon,
        #[arg(long)]
        style: String,
    },
    Background {
        #[command(flatten)]
        common: EditCommon,
        #[arg(long = "new-bg")]
        new_bg: String,
    },
    Add {
        #[command(flatten)]
        common: EditCommon,
        #[arg(long)]
        element: String,
        #[arg(long, default_value = genimg_engine::edit::DEFAULT_ADD_POSITION)]
        position: String,
    },
    Remove {
        #[command(flatten)]
        common: EditCommon,
        #[arg(long)]
        element: String,
    },
    Recolor {
        #[command(flatten)]
        common: EditCommon,
        #[arg(long)]
        target: String,
        #[arg(long)]
        color: String,
    },
    /// Compose several images into one.
    Combine {
        #[arg(long, num_args = 1.., required = true)]
        images: Vec<PathBuf>,
        #[arg(long, short)]
        prompt: String,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, short)]
        model: Option<String>,
        #[arg(long, short)]
        aspect: Option<String>,
        #[arg(long)]
        thinking: bool,
    },
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(long, short)]
    config: PathBuf,
    #[arg(long, short, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    #[arg(long, short, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
    /// Append run events as JSON lines.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Write the final report as pretty JSON.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long, short, default_value = "flash")]
    model: String,
    #[arg(long, short, default_value = DEFAULT_ASPECT_RATIO)]
    aspect: String,
    #[arg(long, short)]
    size: Option<String>,
    #[arg(long)]
    thinking: bool,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("genimg error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let transport = transport(cli.dry_run)?;
    match cli.command {
        Command::Generate(args) => run_generate(args, transport),
        Command::Edit(command) => run_edit(command, transport),
        Command::Batch(args) => run_batch(args, transport),
        Command::Chat(args) => run_chat(args, transport),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn transport(dry_run: bool) -> Result<Arc<dyn Transport>> {
    if dry_run {
        tracing::info!("dry run: no requests leave this machine");
        return Ok(Arc::new(DryrunTransport::new()));
    }
    Ok(Arc::new(HttpTransport::from_env()?))
}

fn run_generate(args: GenerateArgs, transport: Arc<dyn Transport>) -> Result<i32> {
    let backend: Backend = args.api.parse()?;
    let tier = backend.resolve_tier(args.model.as_deref())?;
    let person_policy = args
        .person_gen
        .as_deref()
        .map(str::parse::<PersonPolicy>)
        .transpose()?;
    let output = args
        .output
        .unwrap_or_else(|| output::default_output_path(&args.output_dir, &args.prompt));
    let request = GenerationRequest {
        name: file_stem(&output),
        backend,
        tier,
        intent: GenerationIntent {
            aspect_ratio: Some(args.aspect),
            resolution: args.size,
            person_policy,
            image_count: Some(args.count),
            thinking: args.thinking,
            grounding: args.grounding,
            with_text: args.with_text,
            ..GenerationIntent::new(args.prompt)
        },
    };

    let paths = Generator::new(transport).generate(&request, &output)?;
    print_paths(&paths);
    Ok(0)
}

fn run_edit(command: EditCommand, transport: Arc<dyn Transport>) -> Result<i32> {
    let (request, output) = edit_request(command)?;
    let paths = Generator::new(transport).edit(&request, &output)?;
    print_paths(&paths);
    Ok(0)
}

fn edit_request(command: EditCommand) -> Result<(EditRequest, PathBuf)> {
    let (operation, common, extra, aspect, size) = match command {
        EditCommand::Edit {
            common,
            prompt,
            aspect,
            size,
            additional,
        } => (EditOperation::Edit { prompt }, common, additional, aspect, size),
        EditCommand::Style { common, style } => {
            (EditOperation::Style { style }, common, Vec::new(), None, None)
        }
        EditCommand::Background { common, new_bg } => (
            EditOperation::Background { background: new_bg },
            common,
            Vec::new(),
            None,
            None,
        ),
        EditCommand::Add {
            common,
            element,
            position,
        } => (
            EditOperation::Add { element, position },
            common,
            Vec::new(),
            None,
            None,
        ),
        EditCommand::Remove { common, element } => {
            (EditOperation::Remove { element }, common, Vec::new(), None, None)
        }
        EditCommand::Recolor {
            common,
            target,
            color,
        } => (
            EditOperation::Recolor { target, color },
            common,
            Vec::new(),
            None,
            None,
        ),
        EditCommand::Combine {
            images,
            prompt,
            output,
            model,
            aspect,
            thinking,
        } => {
            let mut request = EditRequest::new(EditOperation::Combine { prompt }, load_images(&images)?);
            request.tier = native_tier(model.as_deref())?;
            request.aspect_ratio = aspect;
            request.thinking = thinking;
            return Ok((request, output));
        }
    };

    let mut paths = vec![common.input];
    paths.extend(extra);
    let mut request = EditRequest::new(operation, load_images(&paths)?);
    request.tier = native_tier(common.model.as_deref())?;
    request.aspect_ratio = aspect;
    request.resolution = size;
    request.thinking = common.thinking;
    Ok((request, common.output))
}

fn native_tier(model: Option<&str>) -> Result<Option<ModelTier>, GenError> {
    model
        .map(|raw| Backend::Native.resolve_tier(Some(raw)))
        .transpose()
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageHandle>> {
    paths
        .iter()
        .map(|path| ImageHandle::from_path(path))
        .collect()
}

fn run_batch(args: BatchArgs, transport: Arc<dyn Transport>) -> Result<i32> {
    let job = BatchJob::load(&args.config, &args.output_dir, args.workers)?;
    println!(
        "Processing {} image config(s) with {} worker(s) on {}...",
        job.requests.len(),
        job.workers,
        job.tier.model_id()
    );

    let mut executor = BatchExecutor::new(Generator::new(transport));
    if let Some(path) = args.events {
        executor = executor.with_events(EventWriter::new(path, Uuid::new_v4().to_string()));
    }
    let report = executor.run_with_progress(&job, |result| match result.status {
        ResultStatus::Success => println!("  [ok] {}: {} image(s)", result.name, result.paths.len()),
        ResultStatus::Error => println!(
            "  [error] {}: {}",
            result.name,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    })?;

    println!("\n{}", report.headline());
    println!("Output: {}", job.output_dir.display());
    if let Some(summary) = args.summary {
        report
            .write_summary(&summary)
            .with_context(|| format!("failed to write {}", summary.display()))?;
    }
    Ok(0)
}

fn run_chat(args: ChatArgs, transport: Arc<dyn Transport>) -> Result<i32> {
    let config = ChatConfig {
        tier: Backend::Native.resolve_tier(Some(args.model.as_str()))?,
        thinking: args.thinking,
        aspect_ratio: args.aspect,
        resolution: args.size,
        output_dir: args.output_dir,
    };
    let generator = Generator::new(transport);
    let mut session = ChatSession::new(config, generator.adapters().native())?;

    println!("Image chat started ({} model)", session.config().tier);
    println!("Type 'help' for commands, 'quit' to exit");
    println!("{}", "-".repeat(40));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            println!("\nGoodbye!");
            break;
        }

        match parse_command(&line) {
            ChatCommand::Noop => continue,
            ChatCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ChatCommand::Help => println!("{CHAT_HELP}"),
            ChatCommand::Status => print_status(&session),
            ChatCommand::History => print_history(&session),
            ChatCommand::Clear => match session.clear() {
                Ok(()) => println!("Conversation cleared. Starting fresh."),
                Err(err) => println!("Error: {err}"),
            },
            ChatCommand::Save(name) => match session.save(name.as_deref()) {
                Ok(path) => println!("Saved to: {}", path.display()),
                Err(err) => println!("Error saving: {err}"),
            },
            ChatCommand::Aspect(ratio) => match session.set_aspect_ratio(&ratio) {
                Ok(()) => {
                    println!("Aspect ratio set to: {}", session.config().aspect_ratio);
                    println!("Note: conversation restarted with the new aspect ratio.");
                }
                Err(err) => println!("Error: {err}"),
            },
            ChatCommand::Size(size) => match session.set_resolution(&size) {
                Ok(()) => {
                    println!("Size set to: {size}");
                    println!("Note: conversation restarted with the new size.");
                }
                Err(err) => println!("Error: {err}"),
            },
            ChatCommand::Model(model) => match session.set_tier(&model) {
                Ok(()) => {
                    println!("Switched to {} model", session.config().tier);
                    println!("Note: Conversation cleared with model change.");
                }
                Err(err) => println!("Error: {err}"),
            },
            ChatCommand::Thinking(enabled) => match session.set_thinking(enabled) {
                Ok(()) => println!("Thinking mode: {}", on_off(enabled)),
                Err(err) => println!("Error: {err}"),
            },
            ChatCommand::Message(text) => {
                println!("Generating...");
                match session.send(&text) {
                    Ok(TurnOutcome::Image { text }) => {
                        println!("[Image generated] Use 'save' to save it.");
                        if let Some(text) = text {
                            println!("Response: {text}");
                        }
                    }
                    Ok(TurnOutcome::Text(text)) => println!("Response: {text}"),
                    Err(err) => println!("Error: {err}"),
                }
            }
        }
    }
    Ok(0)
}

fn print_status(session: &ChatSession) {
    let status = session.status();
    println!("Model: {}", status.tier);
    println!("Thinking: {}", on_off(status.thinking));
    println!("Aspect ratio: {}", status.aspect_ratio);
    println!("Image size: {}", status.resolution.as_deref().unwrap_or("default"));
    println!("Images generated: {}", status.images_generated);
    println!("Has current image: {}", status.has_image);
    println!("State: {}", status.state);
}

fn print_history(session: &ChatSession) {
    let history = session.history();
    if history.is_empty() {
        println!("No conversation history yet.");
        return;
    }
    for (idx, turn) in history.iter().enumerate() {
        println!(
            "{}. {}: {}",
            idx + 1,
            turn.role,
            truncate_for_history(&turn.content, HISTORY_PREVIEW_CHARS)
        );
    }
}

fn truncate_for_history(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn print_paths(paths: &[PathBuf]) {
    println!("Generated {} image(s):", paths.len());
    for path in paths {
        println!("  {}", path.display());
    }
}
