//! Command allowlist enforcement
//!
//! Turns a raw command string into an argv that is safe to hand to the
//! sandbox, or rejects it. No shell is ever consulted: the string is checked
//! for forbidden metacharacters *before* tokenisation (so quoting cannot
//! smuggle them past the tokeniser), split with POSIX word rules and no
//! expansion, and the head token is matched against a fixed allowlist.
//!
//! `sh -c <script>` and `bash -c <script>` are accepted only when the script
//! itself passes the same metacharacter check and its first word is also
//! allowlisted. That keeps the calling convention some models insist on while
//! denying the shell anything a plain argv could not do.

/// Commands the sandbox will run. Compile-time constant; everything else is
/// denied.
pub const ALLOWED_COMMANDS: &[&str] = &[
    // file inspection
    "ls", "cat", "head", "tail", "wc", "file", "stat",
    // text processing
    "grep", "sed", "awk", "sort", "uniq", "cut", "tr",
    // traversal
    "find", "pwd", "echo",
    // mutation within the workspace
    "mkdir", "touch", "cp", "mv", "rm",
    // restricted shell forms, see validate()
    "sh", "bash",
];

/// Substrings that reject a command outright, checked on the raw string
const FORBIDDEN_PATTERNS: &[&str] = &["|", "&", ";", ">", "<", "`", "$(", "${", "\n", "\r"];

/// Why a command was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateError {
    /// The raw string contains a shell metacharacter
    ForbiddenPattern,
    /// Nothing left after tokenisation
    EmptyCommand,
    /// Head token is not on the allowlist
    NotAllowed(String),
    /// `sh`/`bash` used with anything other than `-c <script>`
    BadShellForm,
}

impl std::fmt::Display for ValidateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidateError::ForbiddenPattern => {
                write!(f, "command contains a forbidden shell metacharacter")
            }
            ValidateError::EmptyCommand => write!(f, "command is empty"),
            ValidateError::NotAllowed(head) => write!(f, "command {:?} is not allowed", head),
            ValidateError::BadShellForm => {
                write!(f, "sh/bash may only be invoked as: sh -c <script>")
            }
        }
    }
}

impl std::error::Error for ValidateError {}

impl ValidateError {
    /// Stable identifier used in tool results and log records
    pub fn kind(&self) -> &'static str {
        match self {
            ValidateError::ForbiddenPattern => "forbidden_pattern",
            ValidateError::EmptyCommand => "empty_command",
            ValidateError::NotAllowed(_) => "not_allowed",
            ValidateError::BadShellForm => "bad_shell_form",
        }
    }
}

/// Validate a command string and return the argv to execute
///
/// Pure function: identical input always yields identical output. The
/// returned tokens are passed to the sandbox exactly as-is, with no further
/// quoting or re-interpretation.
pub fn validate(command: &str) -> Result<Vec<String>, ValidateError> {
    check_forbidden(command)?;

    let tokens = shlex::split(command).ok_or(ValidateError::ForbiddenPattern)?;
    if tokens.is_empty() {
        return Err(ValidateError::EmptyCommand);
    }

    let head = tokens[0].as_str();
    if !ALLOWED_COMMANDS.contains(&head) {
        return Err(ValidateError::NotAllowed(tokens[0].clone()));
    }

    if head == "sh" || head == "bash" {
        validate_shell_form(&tokens)?;
    }

    Ok(tokens)
}

/// Reject raw strings containing metacharacters, before any tokenisation
fn check_forbidden(raw: &str) -> Result<(), ValidateError> {
    if FORBIDDEN_PATTERNS.iter().any(|p| raw.contains(p)) {
        return Err(ValidateError::ForbiddenPattern);
    }
    Ok(())
}

/// `sh`/`bash` must be exactly `-c <script>`, and the script must itself be
/// a simple allowlisted command
///
/// A script whose first word is again `sh`/`bash` is held to the same form,
/// recursively, so nesting cannot launder a non-allowlisted command through
/// an inner shell.
fn validate_shell_form(tokens: &[String]) -> Result<(), ValidateError> {
    if tokens.len() != 3 || tokens[1] != "-c" {
        return Err(ValidateError::BadShellForm);
    }

    let script = &tokens[2];
    check_forbidden(script)?;

    let inner = shlex::split(script).ok_or(ValidateError::ForbiddenPattern)?;
    let inner_head = inner.first().ok_or(ValidateError::BadShellForm)?;
    if inner_head == "sh" || inner_head == "bash" {
        return validate_shell_form(&inner);
    }
    if !ALLOWED_COMMANDS.contains(&inner_head.as_str()) {
        return Err(ValidateError::NotAllowed(inner_head.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_command_is_accepted() {
        let argv = validate("ls /workspace").unwrap();
        assert_eq!(argv, vec!["ls", "/workspace"]);
    }

    #[test]
    fn quoting_is_preserved_in_argv() {
        let argv = validate("grep 'hello world' file.txt").unwrap();
        assert_eq!(argv, vec!["grep", "hello world", "file.txt"]);
    }

    #[test]
    fn pipe_is_rejected() {
        assert_eq!(validate("ls | grep foo"), Err(ValidateError::ForbiddenPattern));
    }

    #[test]
    fn quoted_metacharacters_are_still_rejected() {
        // The raw-string check runs before tokenisation, so quoting does not help.
        assert_eq!(validate("echo 'a | b'"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("echo \"$(id)\""), Err(ValidateError::ForbiddenPattern));
    }

    #[test]
    fn redirection_and_background_are_rejected() {
        assert_eq!(validate("echo hi > /tmp/x"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("sort < input"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("sleep 5 &"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("ls; rm -rf /"), Err(ValidateError::ForbiddenPattern));
    }

    #[test]
    fn substitution_is_rejected() {
        assert_eq!(validate("echo `id`"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("echo ${HOME}"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("echo $(id)"), Err(ValidateError::ForbiddenPattern));
    }

    #[test]
    fn newline_is_rejected() {
        assert_eq!(validate("ls\nrm -rf /"), Err(ValidateError::ForbiddenPattern));
        assert_eq!(validate("ls\rpwd"), Err(ValidateError::ForbiddenPattern));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert_eq!(validate(""), Err(ValidateError::EmptyCommand));
        assert_eq!(validate("   "), Err(ValidateError::EmptyCommand));
    }

    #[test]
    fn unknown_head_is_rejected() {
        assert_eq!(
            validate("curl http://example.com"),
            Err(ValidateError::NotAllowed("curl".to_string()))
        );
        assert_eq!(
            validate("python3 -c 'print(1)'"),
            Err(ValidateError::NotAllowed("python3".to_string()))
        );
    }

    #[test]
    fn absolute_paths_are_not_resolved() {
        // Fail closed: the allowlist matches whole tokens, not basenames.
        assert_eq!(
            validate("/bin/ls /workspace"),
            Err(ValidateError::NotAllowed("/bin/ls".to_string()))
        );
    }

    #[test]
    fn sh_dash_c_with_simple_script_is_accepted() {
        let argv = validate("sh -c 'ls /workspace'").unwrap();
        assert_eq!(argv, vec!["sh", "-c", "ls /workspace"]);
    }

    #[test]
    fn bash_dash_c_is_accepted() {
        let argv = validate("bash -c 'pwd'").unwrap();
        assert_eq!(argv, vec!["bash", "-c", "pwd"]);
    }

    #[test]
    fn sh_without_dash_c_is_rejected() {
        assert_eq!(validate("sh script.sh"), Err(ValidateError::BadShellForm));
        assert_eq!(validate("sh"), Err(ValidateError::BadShellForm));
        assert_eq!(validate("bash -x 'ls'"), Err(ValidateError::BadShellForm));
    }

    #[test]
    fn sh_dash_c_with_extra_tokens_is_rejected() {
        assert_eq!(validate("sh -c ls pwd"), Err(ValidateError::BadShellForm));
    }

    #[test]
    fn sh_dash_c_script_with_metacharacters_is_rejected() {
        // The inner script goes through the same metacharacter check.
        assert_eq!(
            validate("sh -c 'ls | grep foo'"),
            Err(ValidateError::ForbiddenPattern)
        );
    }

    #[test]
    fn sh_dash_c_script_with_unknown_head_is_rejected() {
        assert_eq!(
            validate("sh -c 'wget http://example.com'"),
            Err(ValidateError::NotAllowed("wget".to_string()))
        );
    }

    #[test]
    fn sh_dash_c_empty_script_is_rejected() {
        assert_eq!(validate("sh -c ''"), Err(ValidateError::BadShellForm));
    }

    #[test]
    fn nested_sh_dash_c_cannot_launder_unknown_commands() {
        // The inner script's head is sh again; the payload must still pass
        // the allowlist.
        assert_eq!(
            validate("sh -c 'sh -c \"id\"'"),
            Err(ValidateError::NotAllowed("id".to_string()))
        );
        assert_eq!(
            validate("bash -c 'sh -c whoami'"),
            Err(ValidateError::NotAllowed("whoami".to_string()))
        );
    }

    #[test]
    fn nested_sh_dash_c_with_allowlisted_payload_is_accepted() {
        let argv = validate("sh -c 'sh -c pwd'").unwrap();
        assert_eq!(argv, vec!["sh", "-c", "sh -c pwd"]);
    }

    #[test]
    fn nested_sh_with_bad_form_is_rejected() {
        // Inner sh without -c breaks the required shape.
        assert_eq!(
            validate("sh -c 'sh script.sh'"),
            Err(ValidateError::BadShellForm)
        );
    }

    #[test]
    fn validator_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(validate("ls -la /workspace"), validate("ls -la /workspace"));
        }
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(validate("echo 'unterminated").is_err());
    }
}
