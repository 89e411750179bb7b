use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use dirscroll::{
    BalancerConfig, EntryDescriptor, ListingFilter, RowBuffer, SessionConfig, SortBy, SortSpec,
    StdFileSystem, ViewSession, Viewport,
};
use tracing::info;

const USAGE: &str = "Usage: dirscroll <directory> [options]
Options:
  --rows N           visible rows (default 20)
  --step N           rows scrolled per tick (default 7)
  --target N         buffered rows per side (default 15)
  --sort KEY         name | ext | size | modified (default name)
  --desc             sort descending
  --hide-hidden      drop hidden entries
  --ext LIST         comma separated extension filter, e.g. jpg,png
  --search TEXT      keep names containing TEXT
  --up               scroll bottom to top after reaching the end";

struct Args {
    dir: PathBuf,
    rows: usize,
    step: usize,
    target: usize,
    sort: SortSpec,
    filter: ListingFilter,
    round_trip: bool,
}

fn parse_args() -> Result<Args> {
    let mut it = std::env::args().skip(1);
    let mut dir = None;
    let mut args = Args {
        dir: PathBuf::new(),
        rows: 20,
        step: 7,
        target: dirscroll::DEFAULT_BALANCE_TARGET,
        sort: SortSpec::default(),
        filter: ListingFilter::default(),
        round_trip: false,
    };

    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .with_context(|| format!("{name} needs a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--rows" => args.rows = value("--rows")?.parse().context("--rows")?,
            "--step" => args.step = value("--step")?.parse().context("--step")?,
            "--target" => args.target = value("--target")?.parse().context("--target")?,
            "--sort" => {
                args.sort.by = match value("--sort")?.as_str() {
                    "name" => SortBy::Name,
                    "ext" => SortBy::Extension,
                    "size" => SortBy::Size,
                    "modified" => SortBy::Modified,
                    other => bail!("unknown sort key {other:?}\n{USAGE}"),
                }
            }
            "--desc" => args.sort.ascending = false,
            "--hide-hidden" => args.filter.show_hidden = false,
            "--ext" => {
                let list = value("--ext")?;
                args.filter.extensions = list.split(',').map(str::to_string).collect();
            }
            "--search" => args.filter.search = value("--search")?,
            "--up" => args.round_trip = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            other => dir = Some(PathBuf::from(other)),
        }
    }

    args.dir = dir.with_context(|| format!("missing directory\n{USAGE}"))?;
    if args.rows == 0 || args.step == 0 {
        bail!("--rows and --step must be positive");
    }
    Ok(args)
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let anchor = std::fs::canonicalize(&args.dir)
        .with_context(|| format!("canonicalize {}", args.dir.display()))?;

    let config = SessionConfig::new(&anchor)
        .filter(args.filter)
        .sort(args.sort)
        .balancer(
            BalancerConfig::default()
                .target(args.target)
                .poll_interval(Duration::from_millis(10)),
        );
    let viewport = Viewport::new(0, args.rows - 1, args.rows);
    let (session, seed) = ViewSession::open(StdFileSystem, config, "root:", viewport)
        .with_context(|| format!("open {}", anchor.display()))?;

    let total = session.snapshot().len();
    info!(entries = total, anchor = %anchor.display(), "session opened");
    println!(
        "{}: {total} entries, seeded rows {}..{}",
        anchor.display(),
        seed.first_index,
        seed.first_index + seed.rows.len()
    );
    let mut rows = RowBuffer::from_seed(seed);

    let last_first = total.saturating_sub(args.rows);
    let mut ticks: Vec<usize> = (0..=last_first).step_by(args.step).collect();
    if ticks.last() != Some(&last_first) {
        ticks.push(last_first);
    }
    if args.round_trip {
        let down = ticks.clone();
        ticks.extend(down.into_iter().rev().skip(1));
    }

    for first in ticks {
        let last = (first + args.rows - 1).min(total.saturating_sub(1));
        session.set_viewport(first, last, args.rows);
        while let Ok(shift) = session.shifts().recv_timeout(Duration::from_millis(30)) {
            let applied = rows.apply(&shift);
            println!(
                "view {first:>6}..{last:<6} shift {:?} +{} -{} -> {}..{}{}",
                shift.edge,
                shift.inserted.len(),
                shift.removed,
                shift.window.start(),
                shift.window.start() + shift.window.len(),
                if applied { "" } else { " (ignored)" }
            );
        }
    }

    let window = session.materialized();
    println!(
        "final window {}..{} ({} rows, generation {})",
        window.first,
        window.first + window.count,
        window.count,
        window.generation
    );
    let first_visible = session.viewport_handle().get().first_visible;
    for entry in rows.iter().skip(first_visible.saturating_sub(rows.first_index())).take(args.rows) {
        println!("  {}", describe(entry));
    }
    Ok(())
}

fn describe(entry: &EntryDescriptor) -> String {
    let size = match entry.size {
        Some(bytes) => format!("{bytes:>10}"),
        None => format!("{:>10}", "<dir>"),
    };
    format!(
        "{} {size} {} {}",
        entry.permissions,
        format_modified(entry.modified),
        entry.identifier
    )
}

fn format_modified(modified: Option<SystemTime>) -> String {
    use chrono::{DateTime, Local};
    match modified {
        Some(m) => DateTime::<Local>::from(m).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".repeat(16),
    }
}

fn main() {
    if let Err(e) = dirscroll::logging::init_tracing() {
        eprintln!("logging disabled: {e}");
    }
    if let Err(e) = run() {
        eprintln!("dirscroll error: {e:?}");
        std::process::exit(1);
    }
}
