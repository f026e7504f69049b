//! CLI subcommands for skill management
//!
//! `shellvisor skills list [-a] | enable <name> | disable <name> | info <name>`

use std::path::PathBuf;

use super::config::SkillsConfig;
use super::manager::SkillManager;

const USAGE: &str = "Usage: shellvisor skills <command>

Commands:
  list [-a|--all]   List available skills (-a includes disabled ones)
  enable <name>     Re-enable a skill disabled in the config
  disable <name>    Disable a skill
  info <name>       Show detailed skill info";

fn config_path() -> PathBuf {
    SkillsConfig::default_path()
}

fn load_manager() -> std::io::Result<SkillManager> {
    let config = SkillsConfig::load(&config_path())?;
    let mut manager = SkillManager::with_default_sources(config);
    manager.discover();
    Ok(manager)
}

/// Run the skills CLI; returns the process exit code
pub fn run_skills_cli(args: &[String]) -> i32 {
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return 0;
    };

    let result = match command.as_str() {
        "list" => {
            let all = args.iter().any(|a| a == "-a" || a == "--all");
            cmd_list(all)
        }
        "enable" => match args.get(1) {
            Some(name) => cmd_enable(name),
            None => {
                eprintln!("Error: enable requires a skill name");
                return 1;
            }
        },
        "disable" => match args.get(1) {
            Some(name) => cmd_disable(name),
            None => {
                eprintln!("Error: disable requires a skill name");
                return 1;
            }
        },
        "info" => match args.get(1) {
            Some(name) => cmd_info(name),
            None => {
                eprintln!("Error: info requires a skill name");
                return 1;
            }
        },
        _ => {
            println!("{}", USAGE);
            return 1;
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_list(include_disabled: bool) -> std::io::Result<i32> {
    let manager = load_manager()?;
    let skills = manager.list_skills(include_disabled);

    if skills.is_empty() {
        println!("No skills found.");
        return Ok(0);
    }

    println!("\n{:<20} {:<12} {:<24} Description", "Name", "Source", "Status");
    println!("{}", "-".repeat(80));

    for meta in &skills {
        let status = if !meta.enabled {
            "disabled (in SKILL.md)"
        } else if manager.config.is_disabled(&meta.name) {
            "disabled (in config)"
        } else {
            "enabled"
        };

        let mut desc = meta.description.clone();
        if desc.len() > 35 {
            desc.truncate(32);
            desc.push_str("...");
        }

        println!(
            "{:<20} {:<12} {:<24} {}",
            meta.name,
            meta.source.to_string(),
            status,
            desc
        );
    }

    println!("\nTotal: {} skill(s)", skills.len());
    Ok(0)
}

fn cmd_enable(name: &str) -> std::io::Result<i32> {
    let mut manager = load_manager()?;

    let Some(skill) = manager.get(name) else {
        eprintln!("Error: skill {:?} not found.", name);
        return Ok(1);
    };

    if !skill.metadata.enabled {
        eprintln!(
            "Error: skill {:?} is disabled in its SKILL.md (enabled: false).",
            name
        );
        eprintln!("Edit the SKILL.md to enable it.");
        return Ok(1);
    }

    if !manager.config.enable(name) {
        println!("Skill {:?} is already enabled.", name);
        return Ok(0);
    }

    manager.config.save(&config_path())?;
    println!("Enabled skill: {}", name);
    Ok(0)
}

fn cmd_disable(name: &str) -> std::io::Result<i32> {
    let mut manager = load_manager()?;

    if manager.get(name).is_none() {
        eprintln!("Error: skill {:?} not found.", name);
        return Ok(1);
    }

    if !manager.config.disable(name) {
        println!("Skill {:?} is already disabled.", name);
        return Ok(0);
    }

    manager.config.save(&config_path())?;
    println!("Disabled skill: {}", name);
    Ok(0)
}

fn cmd_info(name: &str) -> std::io::Result<i32> {
    let manager = load_manager()?;

    let Some(skill) = manager.get(name) else {
        eprintln!("Error: skill {:?} not found.", name);
        return Ok(1);
    };

    let meta = &skill.metadata;
    println!("\nSkill: {}", meta.name);
    println!("{}", "-".repeat(40));
    println!("Description: {}", meta.description);
    println!("Version: {}", meta.version);
    println!("Source: {}", meta.source);

    let status = if !meta.enabled {
        "disabled (in SKILL.md)".to_string()
    } else if manager.config.is_disabled(&meta.name) {
        "disabled (in config)".to_string()
    } else {
        "enabled".to_string()
    };
    println!("Status: {}", status);

    if !meta.tags.is_empty() {
        println!("Tags: {}", meta.tags.join(", "));
    }
    println!("Path: {}", meta.path.display());

    Ok(0)
}
