use anyhow::{anyhow, bail, Context, Result};
use chrono::DateTime;
use clap::{Args, Subcommand};
use mos_core::quiz::{score_quiz, AnswerKey, QuizAnswer};
use mos_core::Role;
use mos_exchange::{ExchangeConfig, InsightExchange};
use mos_storage::{SaveOutcome, StudyStore};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum GroupCommand {
    /// Join a group, replacing the current one
    Set { name: String },
    /// Show the active group
    Show,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum ProfileCommand {
    /// Set the display name peers will see
    Name { name: String },
    /// Set the local role (student or instructor)
    Role { role: String },
    /// Show the stored profile
    Show,
}

#[derive(Args, Debug)]
pub struct ReflectArgs {
    /// Lesson index (0-based, as carried in the payload)
    #[arg(long)]
    pub lesson: u32,
    /// Reflection text
    pub text: String,
}

#[derive(Args, Debug)]
pub struct PeersArgs {
    #[arg(long)]
    pub lesson: u32,
    /// Print raw JSON instead of the list view
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct QuizArgs {
    #[arg(long)]
    pub lesson: u32,
    /// Comma-separated selected options, in question order
    #[arg(long)]
    pub answers: String,
    /// Comma-separated correct options, in question order
    #[arg(long)]
    pub key: String,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShareArgs {
    #[arg(long)]
    pub lesson: u32,
    /// Mark the insight as mastered regardless of the stored quiz result
    #[arg(long)]
    pub mastered: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(long)]
    pub lesson: u32,
    /// Pasted share message; read from stdin when omitted
    pub text: Option<String>,
}

pub struct StudyContext {
    store: StudyStore,
    exchange: InsightExchange,
}

impl StudyContext {
    pub fn new(store_flag: Option<PathBuf>) -> Result<Self> {
        let path = resolve_store_path(store_flag);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create data directory {}", parent.display()))?;
            }
        }
        debug!("opening study store at {}", path.display());
        let store = StudyStore::open(&path)
            .with_context(|| format!("open study store at {}", path.display()))?;
        Ok(Self {
            store,
            exchange: InsightExchange::new(ExchangeConfig::default()),
        })
    }
}

pub fn handle_group_command(ctx: &StudyContext, command: GroupCommand) -> Result<()> {
    match command {
        GroupCommand::Set { name } => {
            if ctx.store.set_active_group(&name)? {
                println!("Joined group \"{}\".", name.trim());
            } else {
                println!("Group name cannot be empty.");
            }
        }
        GroupCommand::Show => match ctx.store.active_group()? {
            Some(group) => println!("{group}"),
            None => println!("No group set."),
        },
    }
    Ok(())
}

pub fn handle_profile_command(ctx: &StudyContext, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Name { name } => {
            if ctx.store.set_display_name(&name)? {
                println!("Display name set to \"{}\".", name.trim());
            } else {
                println!("Display name cannot be empty.");
            }
        }
        ProfileCommand::Role { role } => {
            let role = role.parse::<Role>().map_err(|err| anyhow!(err))?;
            ctx.store.set_role(role)?;
            println!("Role set to {role}.");
        }
        ProfileCommand::Show => {
            let name = ctx.store.display_name()?;
            let role = ctx.store.role()?;
            let group = ctx.store.active_group()?;
            println!("Name:  {}", name.as_deref().unwrap_or("(unset)"));
            println!(
                "Role:  {}",
                role.map(|role| role.to_string())
                    .unwrap_or_else(|| "(unset)".to_string())
            );
            println!("Group: {}", group.as_deref().unwrap_or("(unset)"));
        }
    }
    Ok(())
}

pub fn reflect(ctx: &StudyContext, args: &ReflectArgs) -> Result<()> {
    ctx.store.set_draft(args.lesson, &args.text)?;
    match ctx.store.save_reflection(args.lesson, &args.text)? {
        SaveOutcome::Saved => println!("Reflection saved."),
        SaveOutcome::Duplicate => println!("You already saved this reflection."),
        SaveOutcome::NoActiveGroup => {
            println!("Reflection kept as a draft. Join a group to share it: mos group set <name>")
        }
        SaveOutcome::EmptyText => println!("Reflection text is empty."),
    }
    Ok(())
}

pub fn peers(ctx: &StudyContext, args: &PeersArgs) -> Result<()> {
    let entries = ctx.store.peer_reflections(args.lesson)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No peer reflections for this lesson yet.");
        return Ok(());
    }
    for entry in entries {
        let stamp = format_timestamp(entry.timestamp);
        let badge = match entry.mastery {
            Some(true) => " [mastered]",
            Some(false) => " [shared]",
            None => "",
        };
        println!("- {} ({stamp}){badge}: {}", entry.student, entry.text);
    }
    Ok(())
}

pub fn quiz(ctx: &StudyContext, args: &QuizArgs) -> Result<()> {
    let answers = parse_answers(&args.answers);
    let key = parse_key(&args.key);
    if key.is_empty() {
        bail!("answer key cannot be empty");
    }

    let report = score_quiz(&answers, &key);
    ctx.store.set_quiz_report(args.lesson, &report)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Score: {}/{}", report.score, report.total);
    if !report.incorrect.is_empty() {
        println!("Missed: {}", report.incorrect.join(", "));
    }
    if report.mastered {
        println!(
            "Mastery reached. Share it with: mos share --lesson {}",
            args.lesson
        );
    } else {
        println!("Below the mastery bar. Review the lesson and retry.");
    }
    Ok(())
}

pub fn share(ctx: &StudyContext, args: &ShareArgs) -> Result<()> {
    let mastered = if args.mastered {
        true
    } else {
        ctx.store
            .quiz_report(args.lesson)?
            .map(|report| report.mastered)
            .unwrap_or(false)
    };

    match ctx.exchange.export_insight(&ctx.store, args.lesson, mastered)? {
        Some(payload) => println!("{}", ctx.exchange.share_message(&payload)),
        None => println!(
            "Set your group and name, then save a reflection for this lesson before sharing."
        ),
    }
    Ok(())
}

pub fn import(ctx: &StudyContext, args: &ImportArgs) -> Result<()> {
    let pasted = match &args.text {
        Some(text) => text.clone(),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("read pasted insight from stdin")?;
            buffer
        }
    };

    let report = ctx.exchange.import_insight(&ctx.store, &pasted, args.lesson)?;
    if report.success {
        debug!("peer insight committed for lesson {}", args.lesson);
    }
    println!("{}", report.message);
    Ok(())
}

fn resolve_store_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(dir) = std::env::var("MOS_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir).join("study.db");
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mini-openstax")
        .join("study.db")
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|stamp| stamp.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn parse_answers(raw: &str) -> Vec<QuizAnswer> {
    raw.split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, selected)| !selected.is_empty())
        .map(|(index, selected)| QuizAnswer {
            question: format!("q{}", index + 1),
            selected: selected.to_string(),
        })
        .collect()
}

fn parse_key(raw: &str) -> AnswerKey {
    raw.split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, option)| !option.is_empty())
        .map(|(index, option)| (format!("q{}", index + 1), option.to_string()))
        .collect()
}
