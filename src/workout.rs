use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

static BUILTIN_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/workouts");

/// Work time assumed per set when estimating session length
pub const WORK_SECS_PER_SET: u32 = 45;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("workout has no exercises")]
    NoExercises,
    #[error("exercise '{exercise}' has no sets")]
    NoSets { exercise: String },
}

#[derive(Debug, Error)]
pub enum WorkoutError {
    #[error("workout '{0}' not found")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("workout '{id}' cannot be started: {source}")]
    Invalid {
        id: String,
        #[source]
        source: DefinitionError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub muscle: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_kg: Option<f64>,
    #[serde(default)]
    pub rest_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub exercises: Vec<ExerciseDefinition>,
}

impl WorkoutDefinition {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.exercises.is_empty() {
            return Err(DefinitionError::NoExercises);
        }
        if let Some(ex) = self.exercises.iter().find(|e| e.sets == 0) {
            return Err(DefinitionError::NoSets {
                exercise: ex.name.clone(),
            });
        }
        Ok(())
    }

    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.sets).sum()
    }

    /// Sum of sets x reps x load over loaded exercises
    pub fn planned_volume_kg(&self) -> f64 {
        self.exercises
            .iter()
            .filter_map(|e| e.load_kg.map(|kg| kg * (e.sets * e.reps) as f64))
            .sum()
    }

    /// Rough session length: work per set plus every rest the session will
    /// schedule. Rest after an exercise's last set uses the next exercise's
    /// rest duration, and the final set is never followed by rest.
    pub fn estimated_duration_secs(&self) -> u32 {
        self.exercises
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let between_sets = e.sets.saturating_sub(1) * e.rest_secs;
                let leading = if i > 0 { e.rest_secs } else { 0 };
                e.sets * WORK_SECS_PER_SET + between_sets + leading
            })
            .sum()
    }
}

/// Where workout definitions come from
pub trait WorkoutSource {
    fn fetch(&self, id: &str) -> Result<WorkoutDefinition, WorkoutError>;
    fn list(&self) -> Vec<WorkoutDefinition>;
}

/// Built-in workouts plus an optional directory of user `*.json` files.
/// User files shadow built-ins with the same id.
#[derive(Debug, Clone)]
pub struct Catalog {
    builtin: Vec<WorkoutDefinition>,
    user_dir: Option<PathBuf>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let mut builtin: Vec<WorkoutDefinition> = BUILTIN_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|f| {
                let origin = f.path().display().to_string();
                let text = f.contents_utf8()?;
                match parse_definition(text, &origin) {
                    Ok(def) => Some(def),
                    Err(e) => {
                        warn!(error = %e, "skipping built-in workout");
                        None
                    }
                }
            })
            .collect();
        builtin.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            builtin,
            user_dir: None,
        }
    }

    pub fn with_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.user_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn user_definitions(&self) -> Vec<WorkoutDefinition> {
        let Some(dir) = &self.user_dir else {
            return Vec::new();
        };
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read workouts directory");
                return Vec::new();
            }
        };
        let mut defs: Vec<WorkoutDefinition> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| match read_definition(&path) {
                Ok(def) => Some(def),
                Err(e) => {
                    warn!(error = %e, "skipping workout file");
                    None
                }
            })
            .collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }
}

impl WorkoutSource for Catalog {
    fn fetch(&self, id: &str) -> Result<WorkoutDefinition, WorkoutError> {
        // a file named after the id gets its errors reported instead of skipped
        let direct = self
            .user_dir
            .as_ref()
            .map(|dir| dir.join(format!("{id}.json")))
            .filter(|path| path.is_file());

        let found = match direct {
            Some(path) => Some(read_definition(&path)?),
            None => self
                .list()
                .into_iter()
                .find(|def| def.id == id),
        };

        let def = found.ok_or_else(|| WorkoutError::NotFound(id.to_string()))?;
        def.validate().map_err(|source| WorkoutError::Invalid {
            id: def.id.clone(),
            source,
        })?;
        Ok(def)
    }

    fn list(&self) -> Vec<WorkoutDefinition> {
        let mut all = self.user_definitions();
        for def in &self.builtin {
            if !all.iter().any(|d| d.id == def.id) {
                all.push(def.clone());
            }
        }
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

fn read_definition(path: &Path) -> Result<WorkoutDefinition, WorkoutError> {
    let text = fs::read_to_string(path).map_err(|source| WorkoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_definition(&text, &path.display().to_string())
}

fn parse_definition(text: &str, origin: &str) -> Result<WorkoutDefinition, WorkoutError> {
    serde_json::from_str(text).map_err(|source| WorkoutError::Parse {
        origin: origin.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn exercise(id: &str, sets: u32, rest_secs: u32) -> ExerciseDefinition {
        ExerciseDefinition {
            id: id.to_string(),
            name: id.to_uppercase(),
            muscle: "Test".to_string(),
            sets,
            reps: 10,
            load_kg: None,
            rest_secs,
            video_url: None,
            instructions: None,
        }
    }

    pub fn workout(id: &str, exercises: Vec<ExerciseDefinition>) -> WorkoutDefinition {
        WorkoutDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            exercises,
        }
    }
}
