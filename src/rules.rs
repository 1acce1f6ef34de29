//! Rule sets - the configurable timing, scoring, and garbage parameters of
//! a match.
//!
//! A rule set is selected at room creation and is immutable once a match
//! starts. The built-in Standard rule uses the classic linear gravity curve
//! (30ms faster per level, floor 30ms); custom rules decay geometrically
//! from their configured initial interval.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    BASE_DROP_MS, DEFAULT_SOFT_DROP_MULTIPLIER, DROP_FLOOR_MS, LINEAR_DECAY_STEP_CAP,
    LINEAR_DECAY_STEP_MS, SOFT_DROP_FLOOR_MS,
};

/// Default per-line-count score values (index = lines cleared).
pub const DEFAULT_LINE_SCORES: [u32; 5] = [0, 40, 100, 300, 1200];

/// Lines-cleared to garbage-rows-sent mapping: single sends nothing,
/// a tetris sends four.
pub const GARBAGE_FOR_LINES: [u8; 5] = [0, 0, 1, 2, 4];

/// How the drop interval changes with level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GravityCurve {
    /// Classic curve of the Standard rule: linear decay per level.
    Linear,
    /// Custom-rule curve: `initial * factor^(level - 1)`.
    Geometric,
}

/// Rule set configuration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("initial drop interval must be positive")]
    ZeroDropInterval,
    #[error("level speed factor must be in (0, 1]")]
    BadSpeedFactor,
    #[error("soft drop multiplier must be in (0, 1]")]
    BadSoftDropMultiplier,
    #[error("lines per level must be positive")]
    ZeroLinesPerLevel,
    #[error("max level must be at least 1")]
    ZeroMaxLevel,
}

/// Named bundle of timing/scoring parameters for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub gravity: GravityCurve,
    /// Drop interval at level 1, milliseconds.
    pub initial_drop_ms: u32,
    /// Geometric decay factor per level (used by `GravityCurve::Geometric`).
    pub level_speed_increase: f64,
    pub soft_drop_multiplier: f64,
    pub lines_per_level: u32,
    pub max_level: u32,
    pub ghost_piece_enabled: bool,
    pub hold_piece_enabled: bool,
    pub single_line_score: u32,
    pub double_line_score: u32,
    pub triple_line_score: u32,
    pub tetris_score: u32,
    /// Per-cell bonus for a manual soft-drop descent (not level-gated).
    pub soft_drop_score: u32,
    /// Per-cell bonus for a hard drop (not level-gated).
    pub hard_drop_score: u32,
    pub garbage_lines_enabled: bool,
    /// Optional match time limit in seconds.
    pub time_limit_secs: Option<u32>,
    pub sudden_death_enabled: bool,
}

impl RuleSet {
    /// The built-in Standard rule, used when a room is created without an
    /// explicit rule set.
    pub fn standard() -> Self {
        Self {
            name: "Standard".to_string(),
            gravity: GravityCurve::Linear,
            initial_drop_ms: BASE_DROP_MS,
            level_speed_increase: 0.9,
            soft_drop_multiplier: DEFAULT_SOFT_DROP_MULTIPLIER,
            lines_per_level: 10,
            max_level: 30,
            ghost_piece_enabled: true,
            hold_piece_enabled: false,
            single_line_score: DEFAULT_LINE_SCORES[1],
            double_line_score: DEFAULT_LINE_SCORES[2],
            triple_line_score: DEFAULT_LINE_SCORES[3],
            tetris_score: DEFAULT_LINE_SCORES[4],
            soft_drop_score: 1,
            hard_drop_score: 2,
            garbage_lines_enabled: false,
            time_limit_secs: None,
            sudden_death_enabled: false,
        }
    }

    /// Validate parameter ranges before a rule set is persisted.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.initial_drop_ms == 0 {
            return Err(RuleError::ZeroDropInterval);
        }
        if !(self.level_speed_increase > 0.0 && self.level_speed_increase <= 1.0) {
            return Err(RuleError::BadSpeedFactor);
        }
        if !(self.soft_drop_multiplier > 0.0 && self.soft_drop_multiplier <= 1.0) {
            return Err(RuleError::BadSoftDropMultiplier);
        }
        if self.lines_per_level == 0 {
            return Err(RuleError::ZeroLinesPerLevel);
        }
        if self.max_level == 0 {
            return Err(RuleError::ZeroMaxLevel);
        }
        Ok(())
    }

    /// Base score for a line clear of `lines` rows (before the level
    /// multiplier).
    pub fn score_for(&self, lines: u8) -> u32 {
        match lines {
            1 => self.single_line_score,
            2 => self.double_line_score,
            3 => self.triple_line_score,
            4 => self.tetris_score,
            _ => 0,
        }
    }

    /// Score gained for clearing `lines` rows at `level` (level is 1-based).
    pub fn clear_score(&self, lines: u8, level: u32) -> u32 {
        self.score_for(lines).saturating_mul(level)
    }

    /// Garbage rows sent to the opponent for clearing `lines` rows.
    /// Zero when garbage attacks are disabled.
    pub fn garbage_rows_for(&self, lines: u8) -> u8 {
        if !self.garbage_lines_enabled {
            return 0;
        }
        GARBAGE_FOR_LINES
            .get(lines as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Gravity interval for `level` (1-based), milliseconds.
    pub fn drop_interval_ms(&self, level: u32) -> u32 {
        let level = level.max(1);
        match self.gravity {
            GravityCurve::Linear => {
                let steps = (level - 1).min(LINEAR_DECAY_STEP_CAP);
                self.initial_drop_ms
                    .saturating_sub(steps * LINEAR_DECAY_STEP_MS)
                    .max(DROP_FLOOR_MS)
            }
            GravityCurve::Geometric => {
                let interval = (self.initial_drop_ms as f64)
                    * self.level_speed_increase.powi(level as i32 - 1);
                (interval.floor() as u32).max(DROP_FLOOR_MS)
            }
        }
    }

    /// Soft-drop interval for `level`, milliseconds.
    pub fn soft_drop_interval_ms(&self, level: u32) -> u32 {
        let normal = self.drop_interval_ms(level) as f64;
        ((normal * self.soft_drop_multiplier).floor() as u32).max(SOFT_DROP_FLOOR_MS)
    }

    /// Whether a player at `level` with `total_lines` cleared should level
    /// up. Level increases by exactly 1 per clear, capped at `max_level`.
    pub fn should_level_up(&self, total_lines: u32, level: u32) -> bool {
        if level >= self.max_level {
            return false;
        }
        total_lines / self.lines_per_level > level - 1
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
