//! System prompt for the agent

/// Base system prompt; tool and skill sections are appended at start-up
const SYSTEM_PROMPT: &str = "You are a careful assistant that can run commands in a sandboxed environment.

Important:
- Commands run in an isolated container with no network access
- Only simple allowlisted commands are accepted; pipes, redirection, and
  command substitution are rejected
- Files persist in /workspace for the duration of the session
- Be careful with destructive operations
- Use web_fetch for public web content; internal addresses are refused

Always explain what you are doing before executing commands. When the task
is complete, answer in plain text without calling any tool. If you cannot
complete a task with the available tools, say why.";

/// Render the full system prompt for a session
///
/// `tools` and `skills` are (name, description) pairs; skills may be empty.
pub fn build_system_prompt(tools: &[(String, String)], skills: &[(String, String)]) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);

    prompt.push_str("\n\nYou have access to the following tools:\n");
    if tools.is_empty() {
        prompt.push_str("(no tools available)\n");
    } else {
        for (name, description) in tools {
            prompt.push_str(&format!("- {}: {}\n", name, description));
        }
    }

    if !skills.is_empty() {
        prompt.push_str("\nEnabled skills (follow their instructions when relevant):\n");
        for (name, description) in skills {
            prompt.push_str(&format!("- {}: {}\n", name, description));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_tools() {
        let tools = vec![
            ("shell_exec".to_string(), "Run a command".to_string()),
            ("web_fetch".to_string(), "Fetch a URL".to_string()),
        ];
        let prompt = build_system_prompt(&tools, &[]);
        assert!(prompt.contains("- shell_exec: Run a command"));
        assert!(prompt.contains("- web_fetch: Fetch a URL"));
        assert!(!prompt.contains("Enabled skills"));
    }

    #[test]
    fn handles_no_tools() {
        let prompt = build_system_prompt(&[], &[]);
        assert!(prompt.contains("(no tools available)"));
    }

    #[test]
    fn lists_skills_when_present() {
        let skills = vec![("summarize".to_string(), "Summarize documents".to_string())];
        let prompt = build_system_prompt(&[], &skills);
        assert!(prompt.contains("Enabled skills"));
        assert!(prompt.contains("- summarize: Summarize documents"));
    }
}
