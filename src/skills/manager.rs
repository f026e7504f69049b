//! Skill discovery and lookup
//!
//! Walks the configured source directories for `<skill>/SKILL.md` files,
//! parses their frontmatter, and keeps the winning definition per name
//! (workspace beats user beats bundled).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::config::SkillsConfig;

/// Where a skill definition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSource {
    Bundled,
    User,
    Workspace,
}

impl std::fmt::Display for SkillSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkillSource::Bundled => write!(f, "bundled"),
            SkillSource::User => write!(f, "user"),
            SkillSource::Workspace => write!(f, "workspace"),
        }
    }
}

/// Parsed frontmatter of a SKILL.md
#[derive(Debug, Clone)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub tags: Vec<String>,
    /// `enabled: false` in the frontmatter takes the skill out of service
    /// entirely; the config's disabled list can be undone from the CLI
    pub enabled: bool,
    pub source: SkillSource,
    pub path: PathBuf,
}

/// A discovered skill: metadata plus the instruction body
#[derive(Debug, Clone)]
pub struct Skill {
    pub metadata: SkillMetadata,
    pub instructions: String,
}

/// Discovers and serves skills from the configured sources
pub struct SkillManager {
    pub config: SkillsConfig,
    sources: Vec<(SkillSource, PathBuf)>,
    skills: HashMap<String, Skill>,
}

impl SkillManager {
    pub fn new(
        config: SkillsConfig,
        bundled_dir: Option<PathBuf>,
        user_dir: Option<PathBuf>,
        workspace_dir: Option<PathBuf>,
    ) -> Self {
        let mut sources = Vec::new();
        if let Some(dir) = bundled_dir {
            sources.push((SkillSource::Bundled, dir));
        }
        if let Some(dir) = user_dir {
            sources.push((SkillSource::User, dir));
        }
        if let Some(dir) = workspace_dir {
            sources.push((SkillSource::Workspace, dir));
        }
        Self {
            config,
            sources,
            skills: HashMap::new(),
        }
    }

    /// Default source directories for the running process
    pub fn with_default_sources(config: SkillsConfig) -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(
            config,
            Some(PathBuf::from("./skills")),
            Some(PathBuf::from(home).join(".shellvisor").join("skills")),
            Some(PathBuf::from("./.shellvisor").join("skills")),
        )
    }

    /// Walk all sources; later sources shadow earlier ones by name
    pub fn discover(&mut self) {
        self.skills.clear();
        let sources = self.sources.clone();
        for (source, dir) in sources {
            self.discover_dir(source, &dir);
        }
        debug!(count = self.skills.len(), "skills discovered");
    }

    fn discover_dir(&mut self, source: SkillSource, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return, // absent source dirs are fine
        };

        for entry in entries.flatten() {
            let skill_md = entry.path().join("SKILL.md");
            if !skill_md.is_file() {
                continue;
            }
            match std::fs::read_to_string(&skill_md) {
                Ok(text) => match parse_skill_md(&text, source, &skill_md) {
                    Some(skill) => {
                        self.skills.insert(skill.metadata.name.clone(), skill);
                    }
                    None => {
                        warn!(path = %skill_md.display(), "SKILL.md has no valid frontmatter");
                    }
                },
                Err(e) => {
                    warn!(path = %skill_md.display(), error = %e, "failed to read SKILL.md");
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Skills visible to callers, sorted by name
    ///
    /// By default both frontmatter-disabled and config-disabled skills are
    /// hidden; `include_disabled` shows everything.
    pub fn list_skills(&self, include_disabled: bool) -> Vec<&SkillMetadata> {
        let mut skills: Vec<&SkillMetadata> = self
            .skills
            .values()
            .map(|s| &s.metadata)
            .filter(|m| include_disabled || self.is_active(&m.name))
            .collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    /// Whether a skill takes effect right now
    pub fn is_active(&self, name: &str) -> bool {
        match self.skills.get(name) {
            Some(skill) => skill.metadata.enabled && !self.config.is_disabled(name),
            None => false,
        }
    }

    /// (name, description) pairs for the system prompt, active skills only
    pub fn prompt_entries(&self) -> Vec<(String, String)> {
        self.list_skills(false)
            .into_iter()
            .map(|m| (m.name.clone(), m.description.clone()))
            .collect()
    }
}

/// Parse a SKILL.md into a skill
///
/// The file must open with a `---` fenced block of `key: value` lines;
/// everything after the closing fence is the instruction body.
fn parse_skill_md(text: &str, source: SkillSource, path: &Path) -> Option<Skill> {
    let rest = text.strip_prefix("---")?;
    let (frontmatter, body) = rest.split_once("\n---")?;

    let mut name = None;
    let mut description = String::new();
    let mut version = "0.0.0".to_string();
    let mut tags = Vec::new();
    let mut enabled = true;

    for line in frontmatter.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        match key.trim() {
            "name" => name = Some(value.to_string()),
            "description" => description = value.to_string(),
            "version" => version = value.to_string(),
            "enabled" => enabled = value != "false",
            "tags" => {
                tags = value
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    Some(Skill {
        metadata: SkillMetadata {
            name: name?,
            description,
            version,
            tags,
            enabled,
            source,
            path: path.to_path_buf(),
        },
        instructions: body.trim().to_string(),
    })
}
