//! Rule presets for each released iteration of the game scene

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::goal::{GeometryError, GoalGeometry};

/// Released iteration of the game scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Iteration {
    /// Open goal mouths, every seat detects goals
    First,
    /// Crossbars become colliders
    Second,
    /// Host-only goal detection, remote player is a passive placeholder
    Final,
}

impl Iteration {
    /// Rule preset for this iteration, with its goal layout validated
    pub fn rules(self) -> Result<SceneRules, GeometryError> {
        let rules = match self {
            Iteration::First => SceneRules {
                goals: GoalGeometry::open()?,
                host_only_goals: false,
                passive_remote: false,
            },
            Iteration::Second => SceneRules {
                goals: GoalGeometry::with_crossbars()?,
                host_only_goals: false,
                passive_remote: false,
            },
            Iteration::Final => SceneRules {
                goals: GoalGeometry::with_crossbars()?,
                host_only_goals: true,
                passive_remote: true,
            },
        };
        Ok(rules)
    }
}

impl Default for Iteration {
    fn default() -> Self {
        Self::Final
    }
}

impl fmt::Display for Iteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Iteration::First => "first",
            Iteration::Second => "second",
            Iteration::Final => "final",
        };
        f.write_str(name)
    }
}

/// Unknown iteration name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game iteration {0:?} (expected first, second or final)")]
pub struct UnknownIteration(pub String);

impl FromStr for Iteration {
    type Err = UnknownIteration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "1" | "v1" => Ok(Iteration::First),
            "second" | "2" | "v2" => Ok(Iteration::Second),
            "final" | "3" | "v3" => Ok(Iteration::Final),
            other => Err(UnknownIteration(other.to_string())),
        }
    }
}

/// Behaviour switches a game scene is built with
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRules {
    pub goals: GoalGeometry,
    /// Only the host seat runs goal detection
    pub host_only_goals: bool,
    /// Remote player has no gravity and is not pushed
    pub passive_remote: bool,
}

impl SceneRules {
    pub fn detects_goals(&self, is_host: bool) -> bool {
        is_host || !self.host_only_goals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("first".parse::<Iteration>().unwrap(), Iteration::First);
        assert_eq!(" Second ".parse::<Iteration>().unwrap(), Iteration::Second);
        assert_eq!("3".parse::<Iteration>().unwrap(), Iteration::Final);
        assert!("fourth".parse::<Iteration>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for it in [Iteration::First, Iteration::Second, Iteration::Final] {
            assert_eq!(it.to_string().parse::<Iteration>().unwrap(), it);
        }
    }

    #[test]
    fn only_final_restricts_goal_detection_to_host() {
        assert!(Iteration::First.rules().unwrap().detects_goals(false));
        assert!(Iteration::Second.rules().unwrap().detects_goals(false));
        assert!(!Iteration::Final.rules().unwrap().detects_goals(false));
        assert!(Iteration::Final.rules().unwrap().detects_goals(true));
    }

    #[test]
    fn crossbars_arrive_in_the_second_iteration() {
        assert!(Iteration::First.rules().unwrap().goals.posts.is_none());
        assert!(Iteration::Second.rules().unwrap().goals.posts.is_some());
        assert!(Iteration::Final.rules().unwrap().passive_remote);
        assert!(!Iteration::Second.rules().unwrap().passive_remote);
    }
}
