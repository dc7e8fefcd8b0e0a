//! Cursor routing — turns a sequence of plotted cells into keycodes.
//!
//! The keystroker walks the DF cursor from cell to cell, sizes each area,
//! and splices the per-command keys into the build type's designate
//! pattern.  Rendering the resulting keycodes is left to [`super::keys`].

use std::collections::HashMap;
use std::str::FromStr;

use clap::ValueEnum;
use thiserror::Error;

use super::geometry::{Area, Direction, ParsePointError, Point};
use super::keys::split_keystring;
use super::ConvertError;

/// Distance covered by one DF jump move.
const JUMP: i32 = 10;
/// Shortest run worth using jump moves for.
const MIN_JUMP_RUN: i32 = 8;

// ───────────────────────────────────────── grid ──────────────

/// A plotted blueprint cell: the command to run and the area it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub command: String,
    pub area: Area,
}

/// Read access to the plotted blueprint.
pub trait Grid {
    fn cell(&self, pos: Point) -> Option<&Cell>;
    fn is_out_of_bounds(&self, pos: Point) -> bool;
}

/// A grid with extents but no cells, for plain cursor movement.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn unbounded() -> Self {
        Self {
            width: i32::MAX,
            height: i32::MAX,
        }
    }
}

impl Grid for Bounds {
    fn cell(&self, _pos: Point) -> Option<&Cell> {
        None
    }

    fn is_out_of_bounds(&self, pos: Point) -> bool {
        pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height
    }
}

/// Plotted cells keyed by the corner the cursor starts them from.
#[derive(Debug, Clone)]
pub struct CellGrid {
    bounds: Bounds,
    cells: HashMap<Point, Cell>,
    order: Vec<Point>,
}

impl CellGrid {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            cells: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Place `cell` at `corner`.  A later placement at the same corner
    /// replaces the earlier one but keeps its position in the plot order.
    pub fn insert(&mut self, corner: Point, cell: Cell) {
        if self.cells.insert(corner, cell).is_none() {
            self.order.push(corner);
        }
    }

    /// Corners in the order they were placed.
    pub fn plots(&self) -> &[Point] {
        &self.order
    }
}

impl Grid for CellGrid {
    fn cell(&self, pos: Point) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    fn is_out_of_bounds(&self, pos: Point) -> bool {
        self.bounds.is_out_of_bounds(pos)
    }
}

/// A command placed on the grid, written `CMD@X,Y` or `CMD@X1,Y1:X2,Y2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub corner: Point,
    pub cell: Cell,
}

#[derive(Debug, Error)]
pub enum ParsePlacementError {
    #[error("expected `CMD@X,Y` or `CMD@X1,Y1:X2,Y2`, got `{0}`")]
    Syntax(String),
    #[error(transparent)]
    Point(#[from] ParsePointError),
}

impl FromStr for Placement {
    type Err = ParsePlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (command, area) = s
            .rsplit_once('@')
            .filter(|(cmd, _)| !cmd.is_empty())
            .ok_or_else(|| ParsePlacementError::Syntax(s.to_string()))?;
        let (corner, end) = match area.split_once(':') {
            Some((a, b)) => (a.parse()?, b.parse()?),
            None => {
                let p: Point = area.parse()?;
                (p, p)
            }
        };
        Ok(Placement {
            corner,
            cell: Cell {
                command: command.to_string(),
                area: Area::new(corner, end),
            },
        })
    }
}

// ───────────────────────────────────────── build config ──────

/// How an area is sized once the cursor reaches its first corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SizeStrategy {
    /// Move to the opposite corner (dig, place, query).
    #[default]
    Standard,
    /// Move to the centre, then widen/heighten the construction.
    Build,
    /// Move to the centre only (fixed-size workshops).
    Fixed,
}

/// Per-command replacements for parts of a [`BuildConfig`].  Unset fields
/// fall back to the build type's value.
#[derive(Debug, Clone, Default)]
pub struct CommandRecipe {
    pub samecmd: Option<Vec<String>>,
    pub diffcmd: Option<Vec<String>>,
    pub designate: Option<Vec<String>>,
    pub setsize: Option<SizeStrategy>,
    pub setmats: Option<bool>,
}

/// Per-build-type keystroke recipe.
///
/// `samecmd`/`diffcmd` and `designate` are patterns: the tokens `cmd`,
/// `menu`, `exitmenu`, `moveto`, `setsize` and `setmats` are replaced by
/// the computed keys, anything else is emitted literally.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Keys emitted once before the first cell.
    pub init: Vec<String>,
    /// Command prefixes that open a DF submenu.
    pub submenu_keys: Vec<char>,
    /// Pattern for a command equal to the previous one.
    pub samecmd: Vec<String>,
    /// Pattern for a command that differs from the previous one.
    pub diffcmd: Vec<String>,
    pub designate: Vec<String>,
    pub setsize: SizeStrategy,
    /// Emit material all-select keys for each area.
    pub setmats: bool,
    pub overrides: HashMap<String, CommandRecipe>,
}

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            init: Vec::new(),
            submenu_keys: Vec::new(),
            samecmd: tokens(&["cmd"]),
            diffcmd: tokens(&["cmd"]),
            designate: tokens(&["exitmenu", "menu", "cmd", "moveto", "!", "setsize", "!"]),
            setsize: SizeStrategy::Standard,
            setmats: false,
            overrides: HashMap::new(),
        }
    }
}

impl BuildConfig {
    /// Default recipe with the given sizing; `setmats` appends material
    /// selection after each area.
    pub fn with_strategy(setsize: SizeStrategy, setmats: bool) -> Self {
        let mut config = Self {
            setsize,
            setmats,
            ..Self::default()
        };
        if setmats {
            config.designate.push("setmats".into());
        }
        config
    }

    /// Size `command` with `strategy` whatever the build type's default.
    pub fn size_command(&mut self, command: &str, strategy: SizeStrategy) {
        self.overrides.entry(command.to_string()).or_default().setsize = Some(strategy);
    }

    /// Select materials after sizing `command`.
    pub fn select_mats_for(&mut self, command: &str) {
        let mut designate = self.designate_for(command).to_vec();
        if !designate.iter().any(|t| t == "setmats") {
            designate.push("setmats".into());
        }
        let recipe = self.overrides.entry(command.to_string()).or_default();
        recipe.designate = Some(designate);
        recipe.setmats = Some(true);
    }

    fn recipe(&self, command: &str) -> Option<&CommandRecipe> {
        self.overrides.get(command)
    }

    pub fn samecmd_for(&self, command: &str) -> &[String] {
        self.recipe(command)
            .and_then(|r| r.samecmd.as_deref())
            .unwrap_or(&self.samecmd)
    }

    pub fn diffcmd_for(&self, command: &str) -> &[String] {
        self.recipe(command)
            .and_then(|r| r.diffcmd.as_deref())
            .unwrap_or(&self.diffcmd)
    }

    pub fn designate_for(&self, command: &str) -> &[String] {
        self.recipe(command)
            .and_then(|r| r.designate.as_deref())
            .unwrap_or(&self.designate)
    }

    pub fn setsize_for(&self, command: &str) -> SizeStrategy {
        self.recipe(command)
            .and_then(|r| r.setsize)
            .unwrap_or(self.setsize)
    }

    pub fn setmats_for(&self, command: &str) -> bool {
        self.recipe(command)
            .and_then(|r| r.setmats)
            .unwrap_or(self.setmats)
    }
}

// ───────────────────────────────────────── movement ──────────

/// Keycodes moving the cursor from `start` to `end`, after `zoffset` level
/// changes (`>` down, `<` up).
///
/// Runs of eight or more steps use jump moves.  A leftover of 8 or 9 is
/// handled by overjumping and stepping back, unless the overjump would
/// leave the grid.
///
/// Coordinates and `zoffset` are expected within
/// ±[`COORD_LIMIT`](super::geometry::COORD_LIMIT); input parsing enforces it.
pub fn move_cursor(
    grid: &dyn Grid,
    mut start: Point,
    end: Point,
    zoffset: i32,
    allow_jumps: bool,
) -> Vec<String> {
    let mut keys = Vec::new();

    let z_key = if zoffset > 0 { ">" } else { "<" };
    keys.extend(std::iter::repeat(z_key.to_string()).take(zoffset.unsigned_abs() as usize));

    let mut allow_backtrack = true;
    while let Some(direction) = Direction::between(start, end) {
        let dx = (start.x - end.x).abs();
        let dy = (start.y - end.y).abs();
        let steps = match (dx, dy) {
            (0, dy) => dy,
            (dx, 0) => dx,
            (dx, dy) => dx.min(dy),
        };

        let step_key = format!("[{}]", direction.compass());
        let jump_key = format!("[+{}]", direction.compass());
        let delta = direction.delta();

        if !allow_jumps || steps < MIN_JUMP_RUN || !allow_backtrack {
            push_n(&mut keys, &step_key, steps);
            start = start + delta * steps;
            allow_backtrack = true;
            continue;
        }

        let mut jumps = steps / JUMP;
        let leftover = steps % JUMP;

        if leftover >= MIN_JUMP_RUN {
            let overjump = start + delta * (JUMP * (jumps + 1));
            if grid.is_out_of_bounds(overjump) {
                push_n(&mut keys, &step_key, leftover);
                start = start + delta * steps;
                allow_backtrack = false;
            } else {
                jumps += 1;
                start = start + delta * (JUMP * jumps);
                allow_backtrack = true;
            }
        } else {
            push_n(&mut keys, &step_key, leftover);
            start = start + delta * steps;
            allow_backtrack = true;
        }

        push_n(&mut keys, &jump_key, jumps);
    }

    keys
}

fn push_n(keys: &mut Vec<String>, key: &str, n: i32) {
    keys.extend(std::iter::repeat(key.to_string()).take(n.max(0) as usize));
}

/// Keys sizing the area from `start` to `end`, and where the cursor ends up.
pub fn set_size(
    grid: &dyn Grid,
    strategy: SizeStrategy,
    start: Point,
    end: Point,
    allow_jumps: bool,
) -> (Vec<String>, Point) {
    match strategy {
        SizeStrategy::Standard => (move_cursor(grid, start, end, 0, allow_jumps), end),
        SizeStrategy::Build => {
            let mid = start.midpoint(end);
            let mut keys = move_cursor(grid, start, mid, 0, allow_jumps);
            let area = Area::new(start, end);
            push_n(&mut keys, "[widen]", area.width() - 1);
            push_n(&mut keys, "[heighten]", area.height() - 1);
            (keys, mid)
        }
        SizeStrategy::Fixed => {
            let mid = start.midpoint(end);
            (move_cursor(grid, start, mid, 0, allow_jumps), mid)
        }
    }
}

/// Material selection keys for an area of `area_size` cells.
///
/// All-select is repeated `2 * floor(sqrt(n))` times with a menu step in
/// between, so a run on one material rolls over to the next.
pub fn setmats(area_size: i32) -> Vec<String> {
    if area_size == 1 {
        return vec!["#".into()];
    }
    let reps = 2 * (area_size.max(0) as f64).sqrt() as i32;
    let mut keys = Vec::new();
    for _ in 0..(reps - 1).max(0) {
        keys.push("#".into());
        keys.push("[menudown]".into());
    }
    keys.push("#".into());
    keys
}

// ───────────────────────────────────────── keystroker ────────

pub struct Keystroker<'a> {
    grid: &'a dyn Grid,
    config: &'a BuildConfig,
    allow_jumps: bool,
}

impl<'a> Keystroker<'a> {
    pub fn new(grid: &'a dyn Grid, config: &'a BuildConfig) -> Self {
        Self {
            grid,
            config,
            allow_jumps: true,
        }
    }

    pub fn allow_jumps(mut self, allow: bool) -> Self {
        self.allow_jumps = allow;
        self
    }

    /// Keycodes that visit and designate every cell in `plots`, starting
    /// with the cursor at `cursor`.
    pub fn plot(&self, plots: &[Point], mut cursor: Point) -> Result<Vec<String>, ConvertError> {
        let cfg = self.config;
        let mut keys = cfg.init.clone();
        let mut last_command: Option<&str> = None;
        let mut last_submenu: Option<char> = None;

        for &pos in plots {
            let cell = self
                .grid
                .cell(pos)
                .ok_or(ConvertError::NoCell { x: pos.x, y: pos.y })?;
            let command = cell.command.as_str();
            let endpos = cell.area.opposite_corner(pos);

            let nextcmd = if last_command == Some(command) {
                cfg.samecmd_for(command)
            } else {
                last_command = Some(command);
                cfg.diffcmd_for(command)
            };

            let moveto = move_cursor(self.grid, cursor, pos, 0, self.allow_jumps);
            let (setsize, newpos) =
                set_size(self.grid, cfg.setsize_for(command), pos, endpos, self.allow_jumps);
            let mats = if cfg.setmats_for(command) {
                setmats(cell.area.size())
            } else {
                Vec::new()
            };

            // Submenu commands carry their menu key as the first character.
            let submenu = command
                .chars()
                .next()
                .filter(|c| cfg.submenu_keys.contains(c) && command.chars().count() > 1);
            let (menu, exitmenu, just_command): (Vec<String>, Vec<String>, &str) = match submenu {
                Some(key) => {
                    let (menu, exit) = match last_submenu {
                        None => (vec![key.to_string()], vec![]),
                        Some(prev) if prev != key => (vec![key.to_string()], vec!["^".to_string()]),
                        Some(_) => (vec![], vec![]),
                    };
                    last_submenu = Some(key);
                    (menu, exit, &command[key.len_utf8()..])
                }
                None => {
                    let exit = match last_submenu.take() {
                        Some(_) => vec!["^".to_string()],
                        None => vec![],
                    };
                    (vec![], exit, command)
                }
            };

            let codes = split_keystring(just_command);
            let cmd: Vec<String> = nextcmd
                .iter()
                .flat_map(|token| {
                    if token == "cmd" {
                        codes.clone()
                    } else {
                        vec![token.clone()]
                    }
                })
                .collect();

            for token in cfg.designate_for(command) {
                match token.as_str() {
                    "menu" => keys.extend(menu.iter().cloned()),
                    "exitmenu" => keys.extend(exitmenu.iter().cloned()),
                    "moveto" => keys.extend(moveto.iter().cloned()),
                    "setsize" => keys.extend(setsize.iter().cloned()),
                    "setmats" => keys.extend(mats.iter().cloned()),
                    "cmd" => keys.extend(cmd.iter().cloned()),
                    literal => keys.push(literal.to_string()),
                }
            }

            cursor = newpos;
        }

        Ok(keys)
    }
}
