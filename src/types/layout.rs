/// Remote working directory holding uploaded modules and payload files.
pub const REMOTE_DIR: &str = "${HOME}/.henchman/";

/// Prefix marking vars that configure the transport instead of templates.
pub const HENCHMAN_PREFIX: &str = "henchman_";

/// Default module search directory, relative to the working directory.
pub const DEFAULT_MODULES_DIR: &str = "modules";

/// Join a remote directory and a file name without doubling separators.
pub fn remote_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Command removing the remote working directory.
pub fn cleanup_command() -> String {
    format!("rm -rf {}", REMOTE_DIR.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_path_joins_once() {
        assert_eq!(remote_path(REMOTE_DIR, "shell"), "${HOME}/.henchman/shell");
        assert_eq!(remote_path("/home/u/.henchman", "shell"), "/home/u/.henchman/shell");
    }

    #[test]
    fn test_cleanup_command() {
        assert_eq!(cleanup_command(), "rm -rf ${HOME}/.henchman");
    }
}
