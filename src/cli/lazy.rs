//! lazygit launcher

use std::path::Path;

use crate::core::config::AppConfig;
use crate::core::detector::detect_active_account;
use crate::core::git::GitRepository;
use crate::core::shell::{ShellCommand, ShellExecutor, SystemShell};
use crate::error::{GheError, Result};

const LAZYGIT: &str = "lazygit";

/// Handle `ghe lazy`
pub fn handle_lazy() -> Result<()> {
    let repo = GitRepository::open_current_dir()?;
    let root = repo.root_dir()?;

    let config = AppConfig::load()?;
    match detect_active_account(&config.accounts, &root)? {
        Some(name) => println!("Active account: {}", name),
        None => println!("Active account: (unknown)"),
    }

    launch(&SystemShell, &root)
}

/// Run lazygit attached to the terminal in `repo_root`
pub fn launch<S: ShellExecutor + ?Sized>(shell: &S, repo_root: &Path) -> Result<()> {
    let command = ShellCommand::new(LAZYGIT, std::iter::empty::<String>()).in_dir(repo_root);
    match shell.run_interactive(&command) {
        Ok(Some(0)) => Ok(()),
        Ok(code) => Err(GheError::CommandFailed {
            program: LAZYGIT.to_string(),
            code,
            stderr: "exited unsuccessfully".to_string(),
        }),
        // Spawn failures carry no exit code
        Err(GheError::CommandFailed { code: None, .. }) => {
            Err(GheError::InvalidInput(install_guidance()))
        }
        Err(e) => Err(e),
    }
}

fn install_guidance() -> String {
    [
        "lazygit is not installed or not on PATH.",
        "",
        "  → macOS:         brew install lazygit",
        "  → Debian/Ubuntu: sudo apt install lazygit",
        "  → Arch:          sudo pacman -S lazygit",
        "  → Fedora:        sudo dnf install lazygit",
        "  → Other:         https://github.com/jesseduffield/lazygit#installation",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shell::MockShellExecutor;

    #[test]
    fn test_launch_in_repo_root() {
        let mut shell = MockShellExecutor::new();
        shell
            .expect_run_interactive()
            .withf(|cmd| cmd.program == "lazygit" && cmd.args.is_empty() && cmd.cwd.as_deref() == Some(Path::new("/repo")))
            .times(1)
            .returning(|_| Ok(Some(0)));

        launch(&shell, Path::new("/repo")).unwrap();
    }

    #[test]
    fn test_non_zero_exit_reported() {
        let mut shell = MockShellExecutor::new();
        shell.expect_run_interactive().returning(|_| Ok(Some(2)));

        let err = launch(&shell, Path::new("/repo")).unwrap_err();
        assert!(matches!(err, GheError::CommandFailed { code: Some(2), .. }));
    }

    #[test]
    fn test_missing_binary_gives_guidance() {
        let mut shell = MockShellExecutor::new();
        shell.expect_run_interactive().returning(|_| {
            Err(GheError::CommandFailed {
                program: "lazygit".into(),
                code: None,
                stderr: "cannot start 'lazygit': No such file or directory".into(),
            })
        });

        let message = launch(&shell, Path::new("/repo")).unwrap_err().to_string();
        assert!(message.contains("brew install lazygit"));
        assert!(message.contains("github.com/jesseduffield/lazygit"));
    }
}
