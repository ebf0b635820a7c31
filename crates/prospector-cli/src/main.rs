//! CLI binary for driving interactive harvest runs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use prospector_judge::{ArkJudge, MatchJudge};
use prospector_pipeline::{
    GateState, PauseGate, PipelineController, PipelineEvent, ResultStore, RunConfig,
    ScriptedProfile, ScriptedSource,
};
use prospector_types::{MonthValue, Verdict};

#[derive(Parser)]
#[command(name = "prospect", version, about = "Candidate profile harvester with tenure and match filtering")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest contacts from a profile set
    Run {
        /// Path to the profile set JSON file
        profiles: PathBuf,

        /// Target company (prompted for when omitted)
        #[arg(long)]
        company: Option<String>,

        /// Target position (prompted for when omitted)
        #[arg(long)]
        position: Option<String>,

        /// Earliest still-eligible employment end month, "YY/M" or "Present"
        #[arg(long)]
        cutoff: Option<String>,

        /// Override the generated judge brief
        #[arg(long)]
        brief: Option<String>,

        /// Output csv path (default: <company>_<position>_contacts.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Accept every eligible profile without calling the judge service
        #[arg(long)]
        dry_run: bool,

        /// Disable the randomized inter-profile delay
        #[arg(long)]
        no_delay: bool,
    },

    /// Show information about a profile set
    Inspect {
        /// Path to the profile set JSON file
        profiles: PathBuf,
    },
}

/// Judge used by --dry-run: every profile matches, no network involved.
struct DryRunJudge;

#[async_trait::async_trait]
impl MatchJudge for DryRunJudge {
    async fn judge(&self, _profile_text: &str, _brief: &str) -> prospector_types::Result<Verdict> {
        Ok(Verdict::Match)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            profiles,
            company,
            position,
            cutoff,
            brief,
            output,
            dry_run,
            no_delay,
        } => {
            cmd_run(
                &profiles, company, position, cutoff, brief, output, dry_run, no_delay,
            )
            .await?;
        }
        Commands::Inspect { profiles } => {
            cmd_inspect(&profiles)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Stdin plumbing
// ---------------------------------------------------------------------------

/// One reader owns stdin for the whole process; prompts and the mid-run
/// control listener both consume from this channel.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn prompt(
    lines: &mut mpsc::UnboundedReceiver<String>,
    message: &str,
    default: Option<&str>,
) -> anyhow::Result<String> {
    use std::io::Write;
    loop {
        match default {
            Some(d) if !d.is_empty() => print!("{message} [{d}]: "),
            _ => print!("{message}: "),
        }
        std::io::stdout().flush()?;
        let answer = lines
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("stdin closed while waiting for input"))?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        if let Some(d) = default {
            return Ok(d.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Run command
// ---------------------------------------------------------------------------

struct CycleParams {
    brief: String,
    cutoff: MonthValue,
    output: PathBuf,
}

/// Empty or unrecognized input degrades to the minimum value, which
/// filters nothing.
fn cutoff_from_input(raw: &str) -> MonthValue {
    MonthValue::parse(raw)
}

/// Only an explicit no ends the run cycle; anything else starts another.
fn wants_another_cycle(answer: &str) -> bool {
    let answer = answer.trim().to_ascii_lowercase();
    answer != "n" && answer != "no"
}

fn default_brief(company: &str, position: &str) -> String {
    format!(
        "目标公司：{company}，目标职位：{position}。\
         请判断候选人最近的工作经历与该职位是否高度匹配。"
    )
}

async fn capture_params(
    lines: &mut mpsc::UnboundedReceiver<String>,
    company: Option<String>,
    position: Option<String>,
    cutoff: Option<String>,
    brief: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<CycleParams> {
    let company = match company {
        Some(c) => c,
        None => prompt(lines, "Target company", None).await?,
    };
    let position = match position {
        Some(p) => p,
        None => prompt(lines, "Target position", None).await?,
    };
    let cutoff_raw = match cutoff {
        Some(c) => c,
        None => {
            prompt(
                lines,
                "Earliest eligible end month (YY/M or Present, empty for no filtering)",
                Some(""),
            )
            .await?
        }
    };
    let cutoff = cutoff_from_input(&cutoff_raw);
    if cutoff == MonthValue::MIN {
        println!("No cutoff set, tenure filtering disabled");
    }

    let brief = brief.unwrap_or_else(|| default_brief(&company, &position));
    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("{company}_{position}_contacts.csv")));
    Ok(CycleParams {
        brief,
        cutoff,
        output,
    })
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    profiles_path: &std::path::Path,
    company: Option<String>,
    position: Option<String>,
    cutoff: Option<String>,
    brief: Option<String>,
    output: Option<PathBuf>,
    dry_run: bool,
    no_delay: bool,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(profiles_path)?;
    let source = Arc::new(ScriptedSource::from_json(&json)?);

    let judge: Arc<dyn MatchJudge> = if dry_run {
        println!("(dry run mode -- no judge calls)");
        Arc::new(DryRunJudge)
    } else {
        Arc::new(ArkJudge::from_env()?)
    };

    let store = Arc::new(ResultStore::new());
    let gate = PauseGate::new();
    let mut lines = stdin_lines();

    let mut params = capture_params(&mut lines, company, position, cutoff, brief, output).await?;

    loop {
        store.reset();
        store.set_sink_path(&params.output);

        let mut config = RunConfig::new(params.brief.clone(), params.cutoff);
        if no_delay {
            config = config.without_delay();
        }
        let controller = Arc::new(PipelineController::new(
            judge.clone(),
            store.clone(),
            gate.clone(),
            config,
        ));

        println!(
            "Run started at {} (cutoff {}, output {})",
            chrono::Local::now().format("%H:%M:%S"),
            params.cutoff,
            params.output.display()
        );
        println!("Controls: Enter/p pause-resume, s snapshot");

        run_cycle(&controller, source.clone(), &store, &gate, &mut lines).await?;

        let again = prompt(&mut lines, "Run another cycle? [Y/n]", Some("y")).await;
        match again {
            Ok(answer) if wants_another_cycle(&answer) => {}
            _ => break,
        }
        // A fresh cycle means fresh search parameters.
        params = capture_params(&mut lines, None, None, None, None, None).await?;
    }

    Ok(())
}

/// Progress line for one pipeline event; the final summary is printed
/// separately, so terminal events yield nothing here.
fn describe_event(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::RunStarted { profile_count } => {
            Some(format!("Enumerated {profile_count} profiles"))
        }
        PipelineEvent::ProfileStarted { ordinal, url } => Some(format!("[{ordinal}] {url}")),
        PipelineEvent::ProfileSkipped {
            reason, progress, ..
        } => Some(format!("  skipped ({reason:?}), progress {progress}")),
        PipelineEvent::RecordAppended { progress, .. } => {
            Some(format!("  appended, progress {progress}"))
        }
        PipelineEvent::SnapshotSaved {
            rows_written,
            progress,
        } => Some(format!("Snapshot: {rows_written} rows, progress {progress}")),
        PipelineEvent::RunCompleted { .. } | PipelineEvent::RunFailed { .. } => None,
    }
}

/// Drive one run while listening for pause and snapshot commands.
async fn run_cycle(
    controller: &Arc<PipelineController>,
    source: Arc<ScriptedSource>,
    store: &Arc<ResultStore>,
    gate: &PauseGate,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<()> {
    let mut events = controller.events().subscribe();
    let run_controller = controller.clone();
    let mut task = tokio::spawn(async move { run_controller.run(source.as_ref()).await });

    let mut stdin_open = true;
    let outcome = loop {
        tokio::select! {
            res = &mut task => break res?,
            event = events.recv() => {
                if let Ok(event) = event {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                }
            }
            maybe = lines.recv(), if stdin_open => match maybe {
                None => stdin_open = false,
                Some(line) => match line.trim() {
                    "s" => {
                        // A failed snapshot here is retried by the next
                        // trigger; the run keeps going either way.
                        match store.snapshot().await {
                            Ok(report) => println!(
                                "Snapshot: {} rows, progress {}",
                                report.rows_written, report.progress
                            ),
                            Err(e) => eprintln!("Snapshot failed: {e}"),
                        }
                    }
                    _ => match gate.toggle() {
                        GateState::Paused => {
                            println!("Paused at progress {}", store.progress());
                            match store.snapshot().await {
                                Ok(report) if !report.skipped_empty => {
                                    println!("Checkpoint saved: {} rows", report.rows_written)
                                }
                                Ok(_) => {}
                                Err(e) => eprintln!("Checkpoint failed: {e}"),
                            }
                        }
                        GateState::Running => println!("Resumed"),
                    },
                },
            },
        }
    };

    // The run can finish while late events are still queued.
    while let Ok(event) = events.try_recv() {
        if let Some(line) = describe_event(&event) {
            println!("{line}");
        }
    }

    if gate.state() == GateState::Paused {
        gate.resume();
    }

    match outcome {
        Ok(summary) => {
            println!("\nRun completed in {} ms", summary.duration_ms);
            println!(
                "Qualified {} of {} processed, {} rows written",
                summary.progress.qualified, summary.progress.processed, summary.rows_written
            );
        }
        Err(e) => {
            eprintln!("\nRun failed: {e}");
            eprintln!("Progress at failure: {}", store.progress());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(profiles_path: &std::path::Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(profiles_path)?;
    let profiles: Vec<ScriptedProfile> = serde_json::from_str(&json)?;

    println!("Profiles: {}", profiles.len());
    let with_tenure = profiles
        .iter()
        .filter(|p| !p.tenure.trim().is_empty())
        .count();
    let unlocked = profiles.iter().filter(|p| p.unlocked).count();
    println!("With tenure text: {}", with_tenure);
    println!("Contact already unlocked: {}", unlocked);

    println!("\nEntries:");
    for profile in &profiles {
        let tenure = if profile.tenure.trim().is_empty() {
            "-"
        } else {
            profile.tenure.as_str()
        };
        println!("  {} [{}] {}", profile.url, tenure, profile.title);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_types::Progress;

    #[test]
    fn empty_cutoff_disables_filtering() {
        assert_eq!(cutoff_from_input(""), MonthValue::MIN);
        assert_eq!(cutoff_from_input("  "), MonthValue::MIN);
        assert_eq!(cutoff_from_input("随便写的"), MonthValue::MIN);
        assert_eq!(cutoff_from_input("24/1"), MonthValue::from_parts(24, 1));
        assert_eq!(cutoff_from_input("Present"), MonthValue::OPEN);
    }

    #[test]
    fn only_an_explicit_no_ends_the_cycle_loop() {
        assert!(wants_another_cycle("y"));
        assert!(wants_another_cycle("yes"));
        assert!(wants_another_cycle(""));
        assert!(wants_another_cycle("q"));
        assert!(!wants_another_cycle("n"));
        assert!(!wants_another_cycle("N"));
        assert!(!wants_another_cycle("no"));
        assert!(!wants_another_cycle(" No "));
    }

    #[test]
    fn event_lines_carry_the_progress_pair() {
        let line = describe_event(&PipelineEvent::RecordAppended {
            ordinal: 2,
            url: "https://example.com/p2".into(),
            progress: Progress {
                processed: 2,
                qualified: 1,
            },
        })
        .unwrap();
        assert!(line.contains("1/2"));

        // Terminal events are summarized separately, not echoed per-event.
        assert!(describe_event(&PipelineEvent::RunCompleted {
            progress: Progress::default(),
            duration_ms: 5,
        })
        .is_none());
    }
}
