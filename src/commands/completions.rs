//! Shell completion scripts

use anyhow::{Context, Result};
use clap::Command;
use clap_complete::{generate, Shell};

/// Where each shell expects the script, printed to stderr on a terminal
#[must_use]
pub const fn install_hint(shell: Shell) -> &'static str {
    match shell {
        Shell::Bash => "checkclaw completions bash > ~/.local/share/bash-completion/completions/checkclaw",
        Shell::Zsh => "checkclaw completions zsh > \"${fpath[1]}/_checkclaw\"",
        Shell::Fish => "checkclaw completions fish > ~/.config/fish/completions/checkclaw.fish",
        Shell::PowerShell => "checkclaw completions powershell >> $PROFILE",
        _ => "checkclaw completions <shell> > <file sourced by your shell>",
    }
}

/// Render the completion script for `shell`
///
/// # Errors
///
/// Returns an error if the generated script is not valid UTF-8
pub fn execute(shell: Shell, mut cmd: Command) -> Result<String> {
    let name = cmd.get_name().to_string();
    let mut script = Vec::new();
    generate(shell, &mut cmd, name, &mut script);
    String::from_utf8(script).context("Completion script is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Arg;

    fn command() -> Command {
        Command::new("checkclaw")
            .subcommand(Command::new("accounts").arg(Arg::new("type").long("type")))
            .subcommand(Command::new("link"))
    }

    #[test]
    fn test_bash_script_names_binary_and_subcommands() {
        let script = execute(Shell::Bash, command()).unwrap();
        assert!(script.contains("checkclaw"));
        assert!(script.contains("accounts"));
        assert!(script.contains("--type"));
    }

    #[test]
    fn test_every_shell_generates() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell, Shell::Elvish] {
            assert!(!execute(shell, command()).unwrap().is_empty());
        }
        assert!(install_hint(Shell::Fish).contains("fish"));
    }
}
