//! Skills - discoverable instruction packs
//!
//! A skill is a directory containing a `SKILL.md`: a small frontmatter block
//! (name, description, version, tags, enabled) followed by free-form
//! instructions. Skills are discovered from three sources, later ones
//! shadowing earlier ones by name:
//!
//! 1. bundled skills shipped next to the binary
//! 2. user skills in `~/.shellvisor/skills`
//! 3. workspace skills in `./.shellvisor/skills`
//!
//! Enabled skills are surfaced to the model through the system prompt; the
//! `skills` CLI subcommands manage the persisted disabled list.

pub mod cli;
pub mod config;
pub mod manager;

pub use config::SkillsConfig;
pub use manager::{Skill, SkillManager, SkillMetadata, SkillSource};
