use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imageai_contracts::chat::parse_intent;
use imageai_contracts::history::{GenerationRecord, HistoryStats};
use imageai_contracts::models::ModelSpec;
use imageai_contracts::settings::Settings;
use imageai_contracts::sizes::SizeCategory;
use imageai_engine::config::default_home_dir;
use imageai_engine::{
    ActionOutcome, ActionTable, AppContext, EngineConfig, Notification, NotificationLevel,
    PipelineState, Presenter,
};

#[derive(Debug, Parser)]
#[command(name = "imageai", version, about = "Turn short prompts into images")]
struct Cli {
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat,
    Generate(GenerateArgs),
    Surprise,
    History(HistoryArgs),
    Show { id: i64 },
    Delete { id: i64 },
    Clear,
    Download(DownloadArgs),
    Share { id: i64 },
    Settings(SettingsArgs),
    Models,
    Stats,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    size: Option<SizeCategory>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct HistoryArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct DownloadArgs {
    id: i64,
    filename: Option<String>,
}

#[derive(Debug, Parser)]
struct SettingsArgs {
    #[arg(long)]
    size: Option<SizeCategory>,
    #[arg(long)]
    model: Option<String>,
}

struct ConsolePresenter {
    verbose: bool,
}

impl Presenter for ConsolePresenter {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => eprintln!("! {}", notification.message),
            NotificationLevel::Warning => eprintln!("~ {}", notification.message),
            NotificationLevel::Success | NotificationLevel::Info => {
                println!("* {}", notification.message)
            }
        }
    }

    fn state_changed(&self, state: PipelineState) {
        if self.verbose && state != PipelineState::Idle {
            println!("  ... {state}");
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("imageai error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    execute(cli, &EngineConfig::from_env())
}

fn execute(cli: Cli, config: &EngineConfig) -> Result<i32> {
    let data_dir = match cli.data_dir.clone().or_else(default_home_dir) {
        Some(dir) => dir,
        None => anyhow::bail!("no data directory: pass --data-dir or set HOME"),
    };
    let out_dir = cli
        .out_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("downloads"));
    let presenter = Arc::new(ConsolePresenter {
        verbose: cli.verbose,
    });
    let ctx = AppContext::open(config, &data_dir, &out_dir, presenter)
        .with_context(|| format!("failed opening {}", data_dir.display()))?;

    match cli.command {
        Command::Chat => {
            run_chat(&ctx)?;
            Ok(0)
        }
        Command::Generate(args) => {
            if let Some(size) = args.size {
                ctx.select_size(size);
            }
            if let Some(model) = args.model.as_deref() {
                ctx.select_model(model)?;
            }
            Ok(finish_generation(ctx.generate(&args.prompt)))
        }
        Command::Surprise => Ok(finish_generation(ctx.surprise())),
        Command::History(args) => {
            let records = ctx.history();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("{}", format_history(&records));
            }
            Ok(0)
        }
        Command::Show { id } => {
            let record = ctx
                .record(id)
                .with_context(|| format!("no image with id {id} in history"))?;
            println!("{}", format_record_detail(&record));
            Ok(0)
        }
        Command::Delete { id } => {
            println!("{}", format_deleted(id, ctx.delete_record(id)));
            Ok(0)
        }
        Command::Clear => {
            ctx.clear_history();
            println!("History cleared.");
            Ok(0)
        }
        Command::Download(args) => {
            let path = ctx.download(args.id, args.filename.as_deref())?;
            println!("Saved {}", path.display());
            Ok(0)
        }
        Command::Share { id } => {
            let path = ctx.share(id)?;
            println!("Shared {}", path.display());
            Ok(0)
        }
        Command::Settings(args) => {
            if let Some(size) = args.size {
                ctx.select_size(size);
            }
            if let Some(model) = args.model.as_deref() {
                ctx.select_model(model)?;
            }
            println!("{}", format_settings(&ctx.settings()));
            Ok(0)
        }
        Command::Models => {
            println!("{}", format_models(&ctx.models(), &ctx.settings()));
            Ok(0)
        }
        Command::Stats => {
            println!("{}", format_stats(&ctx.stats()));
            Ok(0)
        }
    }
}

fn finish_generation<E: std::fmt::Display>(result: Result<GenerationRecord, E>) -> i32 {
    match result {
        Ok(record) => {
            println!("{}", format_record_detail(&record));
            0
        }
        Err(err) => {
            eprintln!("imageai error: {err}");
            1
        }
    }
}

fn run_chat(ctx: &AppContext) -> Result<()> {
    let actions = ActionTable::standard();
    let stdin = io::stdin();
    let mut line = String::new();

    println!("ImageAI chat started. Type a prompt, or /help for commands.");
    println!("{}", format_settings(&ctx.settings()));

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
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match actions.dispatch(ctx, &intent) {
            ActionOutcome::Quit => break,
            outcome => {
                if let Some(text) = render_outcome(&outcome, &ctx.settings()) {
                    println!("{text}");
                }
            }
        }
    }
    Ok(())
}

fn render_outcome(outcome: &ActionOutcome, settings: &Settings) -> Option<String> {
    match outcome {
        ActionOutcome::Generated(record) => Some(format_record_detail(record)),
        ActionOutcome::History(records) => Some(format_history(records)),
        ActionOutcome::Record(record) => Some(format_record_detail(record)),
        ActionOutcome::Deleted { id, removed } => Some(format_deleted(*id, *removed)),
        ActionOutcome::Cleared => Some("History cleared.".to_string()),
        ActionOutcome::Delivered(path) => Some(format!("Saved {}", path.display())),
        ActionOutcome::Settings(settings) => Some(format_settings(settings)),
        ActionOutcome::Models(models) => Some(format_models(models, settings)),
        ActionOutcome::Stats(stats) => Some(format_stats(stats)),
        ActionOutcome::Help(commands) => Some(format!("Commands: {}", commands.join(" "))),
        ActionOutcome::GenerationFailed(_)
        | ActionOutcome::Failed(_)
        | ActionOutcome::Quit
        | ActionOutcome::Noop => None,
    }
}

fn format_record_line(record: &GenerationRecord) -> String {
    let model = if record.model.is_empty() {
        "?"
    } else {
        record.model.as_str()
    };
    format!(
        "{}  {:<9} {:<12} {}",
        record.id,
        record.size.as_str(),
        model,
        record.prompt
    )
}

fn format_record_detail(record: &GenerationRecord) -> String {
    let model = if record.model.is_empty() {
        "?"
    } else {
        record.model.as_str()
    };
    format!(
        "#{} {}\n  size: {}  model: {}  at: {}\n  {}",
        record.id, record.prompt, record.size, model, record.timestamp, record.image_url
    )
}

fn format_history(records: &[GenerationRecord]) -> String {
    if records.is_empty() {
        return "No images yet.".to_string();
    }
    records
        .iter()
        .map(format_record_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_deleted(id: i64, removed: bool) -> String {
    if removed {
        format!("Deleted #{id}.")
    } else {
        format!("No image with id {id}; nothing deleted.")
    }
}

fn format_settings(settings: &Settings) -> String {
    format!(
        "Size: {}  Model: {}",
        settings.selected_size, settings.selected_model
    )
}

fn format_models(models: &[ModelSpec], settings: &Settings) -> String {
    models
        .iter()
        .map(|model| {
            let marker = if model.name == settings.selected_model {
                "*"
            } else {
                " "
            };
            format!("{marker} {:<14} {}", model.name, model.label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_stats(stats: &HistoryStats) -> String {
    let mut lines = vec![format!("Images created: {}", stats.total)];
    if stats.total > 0 {
        lines.push(format!("  by model: {}", format_counts(&stats.by_model)));
        lines.push(format!("  by size: {}", format_counts(&stats.by_size)));
    }
    lines.join("\n")
}

fn format_counts<'a>(counts: impl IntoIterator<Item = (&'a String, &'a usize)>) -> String {
    counts
        .into_iter()
        .map(|(key, count)| format!("{key} {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> EngineConfig {
        EngineConfig {
            profile_path: None,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn global_flags_parse_after_the_subcommand() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "imageai",
            "generate",
            "--prompt",
            "Un chat",
            "--size",
            "portrait",
            "--data-dir",
            "/tmp/imageai-test",
        ])?;
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/imageai-test")));
        let Command::Generate(args) = cli.command else {
            anyhow::bail!("expected generate");
        };
        assert_eq!(args.prompt, "Un chat");
        assert_eq!(args.size, Some(SizeCategory::Portrait));
        assert_eq!(args.model, None);
        Ok(())
    }

    #[test]
    fn unknown_size_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["imageai", "settings", "--size", "huge"]).is_err());
    }

    #[test]
    fn settings_subcommand_persists_into_the_data_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let data_dir = temp.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from([
            "imageai",
            "--data-dir",
            data_dir.as_str(),
            "settings",
            "--size",
            "landscape",
            "--model",
            "turbo",
        ])?;
        assert_eq!(execute(cli, &offline_config())?, 0);

        let raw = std::fs::read_to_string(temp.path().join("store.json"))?;
        assert!(raw.contains("imageai_settings"));
        assert!(raw.contains("landscape"));
        assert!(raw.contains("turbo"));
        Ok(())
    }

    #[test]
    fn unknown_model_fails_the_one_shot_command() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let data_dir = temp.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from([
            "imageai",
            "--data-dir",
            data_dir.as_str(),
            "settings",
            "--model",
            "dall-e",
        ])?;
        assert!(execute(cli, &offline_config()).is_err());
        Ok(())
    }

    #[test]
    fn history_lines_keep_one_record_per_line() {
        let record = GenerationRecord {
            id: 7,
            prompt: "Un chat".to_string(),
            image_url: "https://image.pollinations.ai/prompt/A%20cat".to_string(),
            size: SizeCategory::Square,
            model: String::new(),
            timestamp: "2026-10-19T00:00:00.000Z".to_string(),
        };
        let text = format_history(&[record.clone()]);
        assert!(text.starts_with("7  square"));
        assert!(text.contains(" ? "));
        assert!(text.ends_with("Un chat"));
        assert_eq!(format_history(&[]), "No images yet.");
        assert!(format_record_detail(&record).contains(&record.image_url));
    }

    #[test]
    fn quiet_outcomes_render_nothing() {
        let settings = Settings::default();
        assert_eq!(render_outcome(&ActionOutcome::Noop, &settings), None);
        assert_eq!(
            render_outcome(&ActionOutcome::Failed("x".to_string()), &settings),
            None
        );
        assert_eq!(
            render_outcome(
                &ActionOutcome::Deleted {
                    id: 3,
                    removed: false
                },
                &settings
            ),
            Some("No image with id 3; nothing deleted.".to_string())
        );
    }
}
