use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use finessr::app::{App, PracticeMode};
use finessr::config::Config;
use finessr::engine::comparator::compare_moves;
use finessr::engine::difficulty::DifficultyTier;
use finessr::engine::finesse::{
    FinesseTarget, format_moves, get_optimal_moves, parse_moves, piece_finesse, resolve_target,
};
use finessr::engine::mastery::ReviewPolicy;
use finessr::engine::pattern::PatternId;
use finessr::engine::piece::PieceType;
use finessr::session::clock::SystemClock;
use finessr::session::input::{DropEvent, MoveOutcome};
use finessr::store::json_store::JsonStore;

#[derive(Parser)]
#[command(name = "finessr", version, about = "Tetris finesse trainer with spaced repetition")]
struct Cli {
    #[arg(long, global = true, help = "Directory holding progress.json")]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Difficulty tier (auto, casual, standard, hardcore, insane)")]
    tier: Option<String>,

    #[arg(long, global = true, help = "Review policy (canonical, lenient)")]
    policy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive practice: type the moves for each target, one line per piece
    Practice {
        #[arg(long, help = "Random targets instead of spaced repetition")]
        free_play: bool,
        #[arg(short = 'n', long, help = "Stop after this many pieces")]
        count: Option<usize>,
    },
    /// Show the next scheduled target without recording anything
    Next,
    /// Judge a move sequence for a pattern without recording it
    Check { pattern: String, moves: String },
    /// Record an externally judged result
    Record {
        pattern: String,
        #[arg(value_parser = ["correct", "miss"])]
        verdict: String,
    },
    /// Judge and record a drop
    Drop {
        pattern: String,
        moves: String,
        #[arg(long, help = "Landing column (defaults to the target's)")]
        column: Option<u8>,
        #[arg(long, help = "Landing rotation (defaults to the target's)")]
        rotation: Option<u8>,
        #[arg(long, help = "Response time in milliseconds")]
        ms: Option<f64>,
    },
    /// Print optimal move sequences
    Table { piece: Option<String> },
    /// Overall mastery and adapter state
    Stats,
    /// Per-pattern accuracy by piece, orientation and column
    Grid,
    /// Recent practice sessions
    History,
    /// Delete all progress
    Reset {
        #[arg(long, help = "Skip confirmation")]
        yes: bool,
    },
    /// Write progress and config to a JSON file
    Export { path: PathBuf },
    /// Replace progress and config with a JSON export
    Import { path: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut app = open_app(&cli)?;

    if let Some(ref key) = cli.policy {
        let Some(policy) = ReviewPolicy::from_key(key) else {
            bail!("unknown review policy: {key}");
        };
        app.config.review_policy = policy.as_str().to_string();
    }
    if let Some(ref key) = cli.tier {
        let tier = if key.eq_ignore_ascii_case("auto") {
            None
        } else {
            match DifficultyTier::from_key(key) {
                Some(tier) => Some(tier),
                None => bail!("unknown difficulty tier: {key}"),
            }
        };
        app.set_manual_tier(tier);
    }

    match cli.command {
        Command::Practice { free_play, count } => {
            if free_play {
                app.practice_mode = PracticeMode::FreePlay;
            }
            practice(&mut app, count)?;
        }
        Command::Next => match app.next_target() {
            Some(target) => print_target(&target),
            None => println!("Nothing to practice."),
        },
        Command::Check { pattern, moves } => {
            let target = target_for(&pattern)?;
            let moves = parse_moves(&moves)?;
            let verdict = if compare_moves(&moves, &target.sequences) {
                "optimal"
            } else {
                "not optimal"
            };
            println!("{}: {verdict}", format_moves(&moves));
            print_target(&target);
        }
        Command::Record { pattern, verdict } => {
            let id: PatternId = pattern.parse()?;
            let outcome = app.record_result(id.piece, id.column, id.rotation, verdict == "correct");
            let card = &outcome.card;
            println!(
                "{id}: {}/{} correct, next due at repetition {}{}",
                card.success_count,
                card.attempts(),
                card.next_due_at,
                if outcome.newly_mastered() { " (mastered!)" } else { "" }
            );
        }
        Command::Drop {
            pattern,
            moves,
            column,
            rotation,
            ms,
        } => {
            let id: PatternId = pattern.parse()?;
            let moves = parse_moves(&moves)?;
            if app.start_drill_for(&id).is_none() {
                bail!("no finesse data for {id}");
            }
            let event = DropEvent {
                piece: id.piece,
                landing_column: column.unwrap_or(id.column),
                landing_rotation: rotation.unwrap_or(id.rotation),
                moves,
                response_time_ms: ms,
            };
            if let Some(result) = app.handle_drop(event) {
                println!(
                    "{}: {}",
                    result.pattern_id,
                    if result.correct { "correct" } else { "miss" }
                );
            }
        }
        Command::Table { piece } => print_table(piece.as_deref())?,
        Command::Stats => print_stats(&app),
        Command::Grid => print_grid(&app),
        Command::History => print_history(&app),
        Command::Reset { yes } => {
            if !yes && !confirm("Delete all progress?")? {
                println!("Aborted.");
                return Ok(());
            }
            app.reset_progress();
            println!("Progress reset.");
        }
        Command::Export { path } => {
            let data = app.export();
            JsonStore::write_export(&data, &path)?;
            println!(
                "Exported {} cards to {}",
                data.progress.cards.len(),
                path.display()
            );
        }
        Command::Import { path } => {
            let data = JsonStore::read_export(&path)?;
            app.import(data)?;
            if cli.data_dir.is_none() {
                app.config.save()?;
            }
            println!("Imported {} cards.", app.progress().cards.len());
        }
    }

    Ok(())
}

fn open_app(cli: &Cli) -> Result<App> {
    match cli.data_dir {
        Some(ref dir) => {
            let store = JsonStore::with_base_dir(dir.clone())?;
            let config = Config::load()?;
            Ok(App::with_parts(
                config,
                Some(store),
                SmallRng::from_entropy(),
                Box::new(SystemClock),
            ))
        }
        None => Ok(App::new()),
    }
}

fn target_for(pattern: &str) -> Result<FinesseTarget> {
    let id: PatternId = pattern.parse()?;
    match resolve_target(&id) {
        Some(target) => Ok(target),
        None => bail!("no finesse data for {id}"),
    }
}

fn print_target(target: &FinesseTarget) {
    println!(
        "{} to column {}, rotation {} ({})",
        target.piece,
        target.column,
        target.rotation,
        target.pattern_id()
    );
    for seq in &target.sequences {
        println!("  {}", format_moves(seq));
    }
}

fn practice(app: &mut App, count: Option<usize>) -> Result<()> {
    println!(
        "Practice ({}). Enter moves like `DL CW HD`, `skip` for a new piece, `q` to quit.",
        app.practice_mode.as_str()
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut played = 0;

    'pieces: while count.is_none_or(|n| played < n) {
        let Some(drill) = app.start_drill() else {
            println!("Nothing to practice.");
            break;
        };
        let target = drill.target.clone();
        println!(
            "\n{} to column {}, rotation {}",
            target.piece, target.column, target.rotation
        );

        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next() else {
                break 'pieces;
            };
            let line = line?;
            match line.trim() {
                "q" | "quit" => break 'pieces,
                "skip" => continue 'pieces,
                "" => continue,
                _ => {}
            }

            let moves = match parse_moves(&line) {
                Ok(moves) => moves,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };

            let mut faulted = false;
            for &mv in &moves {
                if app.process_move(mv) == Some(MoveOutcome::Fault) {
                    faulted = true;
                    break;
                }
            }
            if faulted {
                println!("Fault! Piece respawned, try again.");
                continue;
            }

            let moves = app
                .drill
                .as_ref()
                .map(|d| d.moves.clone())
                .unwrap_or_default();
            let event = DropEvent {
                piece: target.piece,
                landing_column: target.column,
                landing_rotation: target.rotation,
                moves,
                response_time_ms: None,
            };
            if let Some(result) = app.handle_drop(event) {
                if result.correct {
                    println!("Correct ({:.1}s)", result.response_time_ms / 1000.0);
                } else {
                    println!("Miss. Optimal:");
                    for seq in &target.sequences {
                        println!("  {}", format_moves(seq));
                    }
                }
            }
            played += 1;
            break;
        }
    }

    if let Some(record) = app.end_session() {
        println!(
            "\nSession: {}/{} correct ({:.0}%), {} patterns, {} newly mastered",
            record.correct_attempts,
            record.total_attempts,
            record.accuracy * 100.0,
            record.distinct_patterns_reviewed,
            record.new_patterns_mastered
        );
    }
    Ok(())
}

fn print_table(piece: Option<&str>) -> Result<()> {
    let pieces: Vec<PieceType> = match piece {
        Some(name) => vec![name.parse()?],
        None => PieceType::all().to_vec(),
    };
    for piece in pieces {
        println!("{piece}");
        for (layer, columns) in piece_finesse(piece).layers.iter().enumerate() {
            for column in 0..columns.len() {
                let sequences: Vec<String> = get_optimal_moves(piece, column, layer)
                    .iter()
                    .map(|seq| format_moves(seq))
                    .collect();
                println!(
                    "  {:<8} {}",
                    PatternId::new(piece, column as u8, layer as u8).to_string(),
                    sequences.join(" | ")
                );
            }
        }
    }
    Ok(())
}

fn print_stats(app: &App) {
    let stats = app.get_overall_stats();
    println!(
        "Mastered {}/{} ({:.0}%), in progress {}, not started {}",
        stats.mastered_count,
        stats.total_patterns,
        stats.mastered_fraction() * 100.0,
        stats.in_progress_count,
        stats.not_started_count
    );
    println!("Lifetime accuracy {:.1}%", stats.overall_accuracy * 100.0);
    println!(
        "Repetitions {}, review policy {}",
        app.progress().global_repetition_count,
        app.config.review_policy
    );
    let perf = app.performance();
    println!(
        "Tier {}{}",
        perf.difficulty_tier.settings().name,
        if perf.manual_tier.is_some() { " (manual)" } else { "" }
    );
}

fn print_grid(app: &App) {
    for piece in app.get_mastery_grid() {
        println!("{}", piece.piece);
        for (layer, cells) in piece.orientations.iter().enumerate() {
            let row: Vec<String> = cells
                .iter()
                .map(|cell| {
                    if !cell.is_attempted() {
                        "  . ".to_string()
                    } else if cell.mastered {
                        "  * ".to_string()
                    } else {
                        format!("{:>3}%", (cell.accuracy * 100.0).round() as u32)
                    }
                })
                .collect();
            println!("  r{layer} {}", row.join(""));
        }
    }
}

fn print_history(app: &App) {
    let history = app.session_history();
    if history.is_empty() {
        println!("No sessions yet.");
        return;
    }
    for record in history {
        println!(
            "{}  {:>3}/{:<3} {:>5.1}%  {} patterns  {} mastered",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.correct_attempts,
            record.total_attempts,
            record.accuracy * 100.0,
            record.distinct_patterns_reviewed,
            record.new_patterns_mastered
        );
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
