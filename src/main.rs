//! QuickFort host — Dwarf Fortress blueprint helper.
//!
//! Every launch runs the startup sequence (single instance, strict
//! environment, version, init, module composition) before serving the
//! requested command.  Run without a command to keep the instance alive
//! until Ctrl-C.

mod bootstrap;
mod config;
mod modules;
mod runtime;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::bootstrap::env::Variables;
use crate::bootstrap::instance::{default_lock_path, SystemProcesses};
use crate::bootstrap::{BootOptions, Bootstrapper, Session};
use crate::modules::qfconvert::geometry::{Point, COORD_LIMIT};
use crate::modules::qfconvert::keys::{convert_keys, split_keystring, OutputMode};
use crate::modules::qfconvert::keystroker::{
    move_cursor, Bounds, BuildConfig, CellGrid, Keystroker, Placement, SizeStrategy,
};
use crate::modules::qfconvert::ConvertError;
use crate::modules::Capabilities;

// ───────────────────────────────────────── CLI ───────────────

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"), version = runtime::VERSION, about = "Dwarf Fortress blueprint helper")]
struct Cli {
    /// Config file (defaults to `$XDG_CONFIG_HOME/quickfort/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start up and stay resident until interrupted (default).
    Run,
    /// List the composed modules in order.
    Modules,
    /// Convert a QuickFort key string to keystrokes or a DF macro.
    Keys {
        keystring: String,
        #[arg(long, value_enum, default_value_t = OutputMode::Key)]
        mode: OutputMode,
        /// Macro title (random when omitted).
        #[arg(long)]
        title: Option<String>,
    },
    /// Print the keys that move the DF cursor between two points.
    Move {
        /// Start as `x,y`.
        from: Point,
        /// End as `x,y`.
        to: Point,
        /// Z-levels to descend (negative ascends).
        #[arg(
            long,
            default_value_t = 0,
            allow_hyphen_values = true,
            value_parser = clap::value_parser!(i32).range(-(COORD_LIMIT as i64)..=COORD_LIMIT as i64)
        )]
        z: i32,
        /// Grid extent as `width,height`; unbounded when omitted.
        #[arg(long)]
        bounds: Option<Point>,
        #[arg(long, value_enum, default_value_t = OutputMode::Key)]
        mode: OutputMode,
    },
    /// Print the keys that visit and designate plotted cells in order.
    Plot {
        /// Cells as `CMD@X,Y` or `CMD@X1,Y1:X2,Y2`.
        #[arg(required = true)]
        cells: Vec<Placement>,
        /// Cursor start as `x,y`.
        #[arg(long, default_value = "0,0")]
        cursor: Point,
        /// Grid extent as `width,height`; unbounded when omitted.
        #[arg(long)]
        bounds: Option<Point>,
        /// How each area is sized from its first corner.
        #[arg(long, value_enum, default_value_t = SizeStrategy::Standard)]
        setsize: SizeStrategy,
        /// Select materials after sizing each area.
        #[arg(long)]
        setmats: bool,
        /// Per-command sizing, e.g. `--size wc=fixed`.
        #[arg(long = "size", value_name = "CMD=STRATEGY", value_parser = parse_size_override)]
        sizes: Vec<(String, SizeStrategy)>,
        /// Select materials for one command only.
        #[arg(long = "mats", value_name = "CMD")]
        mats: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputMode::Key)]
        mode: OutputMode,
    },
    /// Write the current settings to the config file.
    SaveConfig,
}

fn parse_size_override(s: &str) -> Result<(String, SizeStrategy), String> {
    let (command, strategy) = s
        .split_once('=')
        .filter(|(cmd, _)| !cmd.is_empty())
        .ok_or_else(|| format!("expected `CMD=STRATEGY`, got `{s}`"))?;
    let strategy = <SizeStrategy as clap::ValueEnum>::from_str(strategy, true)?;
    Ok((command.to_string(), strategy))
}

// ───────────────────────────────────────── commands ──────────

fn print_modules(session: &Session) {
    println!("{} {}", env!("CARGO_PKG_NAME"), session.runtime.version);
    for (i, cap) in session.capabilities.entries.iter().enumerate() {
        println!("{:>2}. {:<11} {}", i + 1, cap.module, cap.detail);
    }
    for file in &session.capabilities.blueprint_files {
        println!("    {}", file.display());
    }
}

fn grid_bounds(bounds: Option<Point>) -> Bounds {
    match bounds {
        Some(p) => Bounds {
            width: p.x,
            height: p.y,
        },
        None => Bounds::unbounded(),
    }
}

fn build_config(
    setsize: SizeStrategy,
    setmats: bool,
    sizes: &[(String, SizeStrategy)],
    mats: &[String],
) -> BuildConfig {
    let mut config = BuildConfig::with_strategy(setsize, setmats);
    for (command, strategy) in sizes {
        config.size_command(command, *strategy);
    }
    for command in mats {
        config.select_mats_for(command);
    }
    config
}

fn plot_codes(
    cells: Vec<Placement>,
    cursor: Point,
    bounds: Option<Point>,
    config: &BuildConfig,
    allow_jumps: bool,
) -> Result<Vec<String>, ConvertError> {
    let mut grid = CellGrid::new(grid_bounds(bounds));
    for placement in cells {
        grid.insert(placement.corner, placement.cell);
    }
    Keystroker::new(&grid, config)
        .allow_jumps(allow_jumps)
        .plot(grid.plots(), cursor)
}

fn render(codes: &[String], mode: OutputMode, title: Option<&str>, caps: &Capabilities) -> Result<()> {
    if mode == OutputMode::Macro && caps.key_bindings.is_empty() {
        if let Some(cap) = caps.get("qfconvert") {
            tracing::warn!("macro output requested but qfconvert has {}", cap.detail);
        }
    }
    let out = convert_keys(codes, mode, title, &caps.key_bindings)?;
    match mode {
        OutputMode::Key => println!("{out}"),
        OutputMode::Macro => print!("{out}"),
    }
    Ok(())
}

async fn stay_resident(session: &Session) -> Result<()> {
    if let Some(pid) = session.replaced_instance() {
        tracing::info!("took over from pid {pid}");
    }
    tracing::info!("modules: {}", session.capabilities.names().join(", "));
    if session.capabilities.key_bindings.is_empty() {
        tracing::info!("no DF key bindings loaded; macro output unavailable");
    }
    eprintln!(
        "{} {} running (pid {}, lock {}); Ctrl-C to quit",
        env!("CARGO_PKG_NAME"),
        session.runtime.version,
        session.runtime.pid,
        session.runtime.lock_path.display()
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");
    Ok(())
}

// ───────────────────────────────────────── main ─────────────

#[tokio::main]
async fn main() -> Result<()> {
    let log_filter = modules::log::init_tracing();

    let cli = Cli::parse();

    // ── startup ───────────────────────────────────────────────
    let options = BootOptions {
        pid: std::process::id(),
        // Still legacy mode: the lock is resolved before the bootstrap runs.
        lock_path: default_lock_path(&Variables::default()),
        config_path: cli.config.clone(),
        log_filter,
    };
    let mut boot = Bootstrapper::new(options, SystemProcesses::new());
    let session = boot.run().context("startup failed")?;
    tracing::debug!("startup {:?} after {} steps", boot.state(), boot.steps().len());

    // ── dispatch ──────────────────────────────────────────────
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => stay_resident(&session).await?,
        Command::Modules => print_modules(&session),
        Command::Keys {
            keystring,
            mode,
            title,
        } => {
            let codes = split_keystring(&keystring);
            render(&codes, mode, title.as_deref(), &session.capabilities)?;
        }
        Command::Move {
            from,
            to,
            z,
            bounds,
            mode,
        } => {
            let grid = grid_bounds(bounds);
            let codes = move_cursor(&grid, from, to, z, session.config.jump_moves);
            render(&codes, mode, None, &session.capabilities)?;
        }
        Command::Plot {
            cells,
            cursor,
            bounds,
            setsize,
            setmats,
            sizes,
            mats,
            mode,
        } => {
            let config = build_config(setsize, setmats, &sizes, &mats);
            let codes = plot_codes(cells, cursor, bounds, &config, session.config.jump_moves)?;
            render(&codes, mode, None, &session.capabilities)?;
        }
        Command::SaveConfig => {
            let path = cli
                .config
                .unwrap_or_else(|| config::config_path(&session.runtime.variables));
            session.config.save(&path)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::qfconvert::keys::KeyBindings;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("quickfort").chain(args.iter().copied()))
    }

    #[test]
    fn plot_command_designates_cells_in_order() {
        let cli = parse(&["plot", "d@0,0:2,0", "d@5,0", "--bounds", "10,5"]).unwrap();
        let Some(Command::Plot {
            cells,
            cursor,
            bounds,
            setsize,
            setmats,
            sizes,
            mats,
            mode,
        }) = cli.command
        else {
            panic!("expected plot");
        };
        assert_eq!(cursor, Point::new(0, 0));
        assert_eq!(mode, OutputMode::Key);

        let config = build_config(setsize, setmats, &sizes, &mats);
        let codes = plot_codes(cells, cursor, bounds, &config, true).unwrap();
        assert_eq!(
            codes,
            ["d", "!", "[e]", "[e]", "!", "d", "[e]", "[e]", "[e]", "!", "!"]
        );

        let keys = convert_keys(&codes, OutputMode::Key, None, &KeyBindings::default()).unwrap();
        assert_eq!(keys, "d{Enter}66{Enter}d666{Enter}{Enter}");
    }

    #[test]
    fn plot_command_build_sizing_with_materials() {
        let cli = parse(&["plot", "Cw@0,0:2,2", "--setsize", "build", "--setmats"]).unwrap();
        let Some(Command::Plot {
            cells,
            cursor,
            bounds,
            setsize,
            setmats,
            ..
        }) = cli.command
        else {
            panic!("expected plot");
        };
        assert_eq!(setsize, SizeStrategy::Build);

        let config = build_config(setsize, setmats, &[], &[]);
        let codes = plot_codes(cells, cursor, bounds, &config, true).unwrap();
        // 3x3 area: centre, widen/heighten twice, then six all-selects.
        let mut expected = vec!["C", "w", "!", "[se]", "[widen]", "[widen]", "[heighten]", "[heighten]", "!"];
        expected.extend(["#", "[menudown]"].repeat(5));
        expected.push("#");
        assert_eq!(codes, expected);
    }

    #[test]
    fn plot_command_per_command_recipes() {
        let cli = parse(&[
            "plot", "d@0,0:1,0", "wc@3,0:5,2", "--size", "wc=FIXED", "--mats", "wc",
        ])
        .unwrap();
        let Some(Command::Plot {
            cells,
            cursor,
            bounds,
            setsize,
            setmats,
            sizes,
            mats,
            ..
        }) = cli.command
        else {
            panic!("expected plot");
        };
        assert_eq!(sizes, [("wc".to_string(), SizeStrategy::Fixed)]);

        let config = build_config(setsize, setmats, &sizes, &mats);
        let codes = plot_codes(cells, cursor, bounds, &config, true).unwrap();
        // `wc` is a 3x3 workshop: move to its centre, then six all-selects.
        let mut expected = vec!["d", "!", "[e]", "!", "w", "c", "[e]", "[e]", "!", "[se]", "!"];
        expected.extend(["#", "[menudown]"].repeat(5));
        expected.push("#");
        assert_eq!(codes, expected);

        assert!(parse(&["plot", "d@0,0", "--size", "d=huge"]).is_err());
        assert!(parse(&["plot", "d@0,0", "--size", "=build"]).is_err());
    }

    #[test]
    fn plot_command_requires_cells() {
        assert!(parse(&["plot"]).is_err());
        assert!(parse(&["plot", "d"]).is_err());
    }

    #[test]
    fn coordinates_and_z_are_range_checked() {
        assert!(parse(&["move", "0,0", "99999,0"]).is_err());
        assert!(parse(&["move", "0,0", "1,1", "--z", "2000000000"]).is_err());
        assert!(parse(&["move", "0,0", "1,1", "--bounds", "2147483647,1"]).is_err());
        assert!(parse(&["plot", "d@0,-20000"]).is_err());

        let cli = parse(&["move", "0,0", "1,1", "--z", "-3"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Move { z: -3, .. })));
    }
}
