use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cutscene::{FixedClock, Fps, PhaseFlow, Script, ScriptedInput, Stage, StepScheduler};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cutscene", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate a script headlessly and print the final target states as JSON.
    Run(RunArgs),
    /// Check a script without running it.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Simulation tick rate.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Stop after this many simulated seconds even if the script has not finished.
    #[arg(long, default_value_t = 120.0)]
    max_secs: f64,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn read_script_json(path: &Path) -> anyhow::Result<Script> {
    let f = File::open(path).with_context(|| format!("open script '{}'", path.display()))?;
    let r = BufReader::new(f);
    let script: Script = serde_json::from_reader(r).with_context(|| "parse script JSON")?;
    Ok(script)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let script = read_script_json(&args.in_path)?;
    script.validate()?;

    let unresolved = script.unresolved_targets();
    for (index, target) in &unresolved {
        eprintln!("warning: step {index} references unknown target '{target}'");
    }
    eprintln!(
        "ok: {} steps, {} macro steps, {} dialogue lines, {} targets, {} unresolved",
        script.steps.len(),
        script.macro_steps.len(),
        script.dialogue.as_ref().map_or(0, |d| d.lines.len()),
        script.targets.len(),
        unresolved.len()
    );
    Ok(())
}

/// Either a bare step run or a step run chained to a dialogue phase.
enum Runner {
    Steps(StepScheduler),
    Flow(Box<PhaseFlow>),
}

impl Runner {
    fn build(script: &Script, stage: &Stage) -> Self {
        if script.macro_steps.is_empty() && script.dialogue.is_none() {
            let scheduler = StepScheduler::new(script.steps.clone(), script.config.clone());
            return Self::Steps(scheduler);
        }
        Self::Flow(Box::new(PhaseFlow::from_script(script, stage)))
    }

    fn awake(&mut self, stage: &mut Stage) {
        match self {
            Self::Steps(s) => s.awake(stage),
            Self::Flow(f) => f.awake(stage),
        }
    }

    fn is_done(&self) -> bool {
        match self {
            Self::Steps(s) => s.is_finished(),
            Self::Flow(f) => f.is_done(),
        }
    }

    fn scheduler(&self) -> &StepScheduler {
        match self {
            Self::Steps(s) => s,
            Self::Flow(f) => f.scheduler(),
        }
    }

    /// Runs one frame and prints what happened.
    fn frame(&mut self, stage: &mut Stage, clock: &mut FixedClock, input: &mut ScriptedInput) {
        let t = clock.now().as_secs_f64();
        let comic = match self {
            Self::Steps(s) => s.drive(stage, clock, input),
            Self::Flow(f) => {
                let out = f.drive(stage, clock, input);
                let unit = if f.dialogue_panel().is_some() { "line" } else { "macro step" };
                if let Some(i) = out.dialogue.started {
                    eprintln!("t={t:.3}s {unit} {i} started");
                }
                if let Some(i) = out.dialogue.completed {
                    eprintln!("t={t:.3}s {unit} {i} complete");
                }
                if let Some(phase) = out.entered {
                    eprintln!("t={t:.3}s phase {phase:?}");
                }
                out.comic
            }
        };
        if let Some(b) = comic.started {
            eprintln!("t={t:.3}s batch {}..{} started", b.start, b.end);
        }
        if let Some(b) = comic.completed {
            eprintln!("t={t:.3}s batch {}..{} complete", b.start, b.end);
        }
        if comic.finished {
            eprintln!("t={t:.3}s steps finished");
        }
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let script = read_script_json(&args.in_path)?;
    script.validate()?;
    if !(args.max_secs.is_finite() && args.max_secs >= 0.0) {
        anyhow::bail!("--max-secs must be finite and >= 0");
    }
    let fps = Fps::new(args.fps, 1)?;

    let mut stage = script.build_stage();

    let mut runner = Runner::build(&script, &stage);
    runner.awake(&mut stage);

    let mut clock = FixedClock::from_fps(fps);
    let mut input = ScriptedInput::from_secs(&script.clicks);
    let limit = Duration::try_from_secs_f64(args.max_secs).context("--max-secs is out of range")?;

    while !runner.is_done() && clock.now() <= limit {
        runner.frame(&mut stage, &mut clock, &mut input);
        input.advance(clock.step());
    }

    let done = runner.is_done();
    if !done {
        tracing::warn!(max_secs = args.max_secs, "stopped before the script finished");
    }

    let summary = summarize(&runner, &mut stage, clock.now(), done);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn summarize(
    runner: &Runner,
    stage: &mut Stage,
    elapsed: Duration,
    done: bool,
) -> serde_json::Value {
    let ids: Vec<_> = stage.ids().cloned().collect();
    let mut targets = serde_json::Map::new();
    for id in ids {
        let Some(t) = stage.get_mut(&id) else {
            continue;
        };
        let mut entry = serde_json::json!({
            "opacity": t.opacity(),
            "scale": t.scale(),
        });
        if t.is_stretched() {
            let (min, max) = t.offsets();
            entry["offset_min"] = serde_json::json!([min.x, min.y]);
            entry["offset_max"] = serde_json::json!([max.x, max.y]);
        } else {
            let p = t.anchored_position();
            entry["anchored_position"] = serde_json::json!([p.x, p.y]);
        }
        if let Some(sprite) = t.sprite() {
            entry["sprite"] = serde_json::json!(sprite);
        }
        if let Some(text) = t.text() {
            entry["visible_characters"] = serde_json::json!(text.visible_character_count());
            entry["character_count"] = serde_json::json!(text.character_count());
        }
        targets.insert(id.to_string(), entry);
    }

    let scheduler = runner.scheduler();
    let mut out = serde_json::json!({
        "done": done,
        "elapsed_secs": elapsed.as_secs_f64(),
        "step_index": scheduler.step_index(),
        "step_count": scheduler.step_count(),
        "targets": targets,
    });
    if let Runner::Flow(flow) = runner {
        out["phase"] = serde_json::json!(flow.phase());
        if let Some(composer) = flow.composer() {
            out["macro_index"] = serde_json::json!(composer.index());
        }
        if let Some(panel) = flow.dialogue_panel() {
            out["line"] = serde_json::json!(panel.line());
            out["line_count"] = serde_json::json!(panel.line_count());
        }
    }
    out
}
