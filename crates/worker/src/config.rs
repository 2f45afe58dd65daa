use std::path::PathBuf;

/// Queue configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Upper bound on simultaneously running jobs (always at least 1).
    pub max_concurrency: usize,
    /// Directory generated files are written to and swept from.
    pub results_dir: PathBuf,
    /// Extension of generated files, without the dot.
    pub output_extension: String,
}

impl QueueConfig {
    /// Defaults for a given results directory.
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_concurrency: 1,
            results_dir: results_dir.into(),
            output_extension: "mp4".to_string(),
        }
    }

    /// Set the concurrency limit; values below 1 are raised to 1.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default     |
    /// |-----------------------|-------------|
    /// | `MAX_CONCURRENT_JOBS` | `1`         |
    /// | `RESULTS_DIR`         | `./results` |
    /// | `OUTPUT_EXTENSION`    | `mp4`       |
    pub fn from_env() -> Self {
        let max_concurrency: usize = std::env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .ok()
            .filter(|n| *n >= 1)
            .expect("MAX_CONCURRENT_JOBS must be a positive integer");

        let results_dir =
            PathBuf::from(std::env::var("RESULTS_DIR").unwrap_or_else(|_| "./results".into()));

        let output_extension = std::env::var("OUTPUT_EXTENSION")
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|_| "mp4".into());

        Self {
            max_concurrency,
            results_dir,
            output_extension,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("./results")
    }
}

/// How to launch the external generator process.
#[derive(Debug, Clone)]
pub struct CommandGeneratorConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child process (current dir if `None`).
    pub working_directory: Option<PathBuf>,
}

impl CommandGeneratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default             |
    /// |---------------------|---------------------|
    /// | `GENERATOR_PROGRAM` | `python3`           |
    /// | `GENERATOR_ARGS`    | `generate_video.py` |
    /// | `GENERATOR_WORKDIR` | (unset)             |
    pub fn from_env() -> Self {
        let program = std::env::var("GENERATOR_PROGRAM").unwrap_or_else(|_| "python3".into());

        let args: Vec<String> = std::env::var("GENERATOR_ARGS")
            .unwrap_or_else(|_| "generate_video.py".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let working_directory = std::env::var("GENERATOR_WORKDIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            program,
            args,
            working_directory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_is_at_least_one() {
        let config = QueueConfig::new("/tmp/out").with_max_concurrency(0);
        assert_eq!(config.max_concurrency, 1);
        let config = QueueConfig::new("/tmp/out").with_max_concurrency(4);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.results_dir, PathBuf::from("./results"));
        assert_eq!(config.output_extension, "mp4");
    }
}
