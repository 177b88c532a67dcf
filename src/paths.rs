use std::env;
use std::path::PathBuf;

/// Where the session/task/calendar records and `settings.toml` live:
/// `--data-dir`, then `LOCKIN_DATA_DIR`, then the platform data directory,
/// else a dot-directory in the working directory.
pub fn resolve_data_dir(cli_dir: Option<PathBuf>) -> PathBuf {
	if let Some(dir) = cli_dir {
		return dir;
	}

	if let Some(dir) = env::var_os("LOCKIN_DATA_DIR") {
		if !dir.is_empty() {
			return PathBuf::from(dir);
		}
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(dir) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(dir).join("lockin");
		}
	}

	if let Some(dir) = env::var_os("XDG_DATA_HOME") {
		return PathBuf::from(dir).join("lockin");
	}

	if let Some(home) = env::var_os("HOME") {
		return PathBuf::from(home)
			.join(".local")
			.join("share")
			.join("lockin");
	}

	PathBuf::from(".lockin")
}
