use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use toolcache_core::{DEFAULT_TOOL_NAME, InstallConfig, LATEST, Platform, default_tool_root};
use toolcache_tools_github::{DEFAULT_RELEASES_URL, GitHubConfig};

use crate::logging::LogLevel;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "toolcache")]
#[command(about = "Install and cache a versioned analysis tool bundle for build pipelines")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Resolve a version, reuse the cache or download the bundle")]
    Install(InstallArgs),
    #[command(about = "List cached versions of the tool")]
    List(ListArgs),
}

/// Where the cache lives and which tool/platform to look at.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[arg(
        long,
        env = "AGENT_TOOLSDIRECTORY",
        help = "Root of the tool cache [default: <user cache dir>/toolcache]"
    )]
    pub tool_root: Option<PathBuf>,

    #[arg(long, help = "Tool directory name inside the cache", default_value = DEFAULT_TOOL_NAME)]
    pub tool_name: String,

    #[arg(long, help = "Target platform such as linux-x64 [default: host platform]")]
    pub platform: Option<String>,
}

impl CacheArgs {
    pub fn tool_root(&self) -> PathBuf {
        self.tool_root.clone().unwrap_or_else(default_tool_root)
    }

    pub fn platform(&self) -> miette::Result<Platform> {
        match &self.platform {
            None => Ok(Platform::current()),
            Some(s) => Platform::parse(s).ok_or_else(|| {
                miette::miette!(
                    help = "Use <os>-<arch>, e.g. linux-x64, macos-arm64, windows-x64",
                    "Unknown platform '{s}'"
                )
            }),
        }
    }
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    #[arg(
        long,
        short = 'v',
        help = "'latest' or a semantic version range/exact value",
        default_value = LATEST
    )]
    pub version_spec: String,

    #[arg(long, help = "Consider draft and prerelease releases")]
    pub allow_unstable: bool,

    #[arg(long, help = "Only use the local cache; never download")]
    pub disable_download: bool,

    #[arg(long, help = "Add the installation to the executable search path")]
    pub add_to_path: bool,

    #[arg(
        long,
        env = "GITHUB_PATH",
        help = "File receiving search path additions (one directory per line)"
    )]
    pub path_file: Option<PathBuf>,

    #[arg(
        long,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token for the GitHub API (anonymous requests are rate-limited)"
    )]
    pub token: Option<String>,

    #[arg(long, help = "Release list endpoint", default_value = DEFAULT_RELEASES_URL)]
    pub releases_url: String,

    #[arg(long, help = "Latest release endpoint [default: <releases-url>/latest]")]
    pub latest_url: Option<String>,

    #[arg(long, help = "Total timeout of each manifest request, in seconds", default_value_t = 300)]
    pub timeout: u64,

    #[arg(
        long,
        help = "Seconds a download may stall between chunks before it is abandoned",
        default_value_t = 60
    )]
    pub read_timeout: u64,

    #[arg(long, help = "Output format", default_value = "text", value_enum)]
    pub output: OutputFormat,
}

impl InstallArgs {
    pub fn install_config(&self) -> miette::Result<InstallConfig> {
        Ok(InstallConfig::new(self.version_spec.clone())
            .with_tool_root(self.cache.tool_root())
            .with_tool_name(self.cache.tool_name.clone())
            .with_allow_unstable(self.allow_unstable)
            .with_disable_download(self.disable_download)
            .with_platform(self.cache.platform()?))
    }

    pub fn github_config(&self) -> GitHubConfig {
        let config = GitHubConfig::default()
            .with_releases_url(self.releases_url.clone())
            .with_token(self.token.clone())
            .with_timeout(Duration::from_secs(self.timeout))
            .with_read_timeout(Duration::from_secs(self.read_timeout));
        match &self.latest_url {
            Some(url) => config.with_latest_url(url.clone()),
            None => config,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    #[arg(long, help = "Output format", default_value = "text", value_enum)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolcache_core::{Arch, Os};

    fn install_args(args: &[&str]) -> InstallArgs {
        let mut argv = vec!["toolcache", "install"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Install(args) => args,
            Commands::List(_) => panic!("expected install"),
        }
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["toolcache", "list"]).unwrap();
        assert!(matches!(cli.level, LogLevel::Warn));
        assert!(!cli.json);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn test_install_defaults() {
        let args = install_args(&["--tool-root", "/opt/tools", "--token", ""]);
        assert_eq!(args.version_spec, "latest");
        assert_eq!(args.cache.tool_name, "CodeQL");
        assert!(!args.allow_unstable);
        assert!(!args.disable_download);
        assert_eq!(args.output, OutputFormat::Text);

        let github = args.github_config();
        assert_eq!(github.releases_url, DEFAULT_RELEASES_URL);
        assert_eq!(github.latest_url, format!("{DEFAULT_RELEASES_URL}/latest"));
        assert!(github.token.is_none());
        assert_eq!(github.timeout, Duration::from_secs(300));
        assert_eq!(github.read_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_install_flags() {
        let args = install_args(&[
            "--version-spec",
            ">=2.0.0",
            "--allow-unstable",
            "--disable-download",
            "--add-to-path",
            "--tool-root",
            "/opt/tools",
            "--platform",
            "windows-x64",
            "--timeout",
            "30",
            "--read-timeout",
            "120",
            "--output",
            "azure",
        ]);

        let config = args.install_config().unwrap();
        assert_eq!(config.version_spec, ">=2.0.0");
        assert!(config.allow_unstable);
        assert!(config.disable_download);
        assert_eq!(config.tool_root, PathBuf::from("/opt/tools"));
        assert_eq!(config.platform, Platform::new(Os::Windows, Arch::X64));
        assert!(args.add_to_path);
        assert_eq!(args.output, OutputFormat::Azure);
        assert_eq!(args.github_config().timeout, Duration::from_secs(30));
        assert_eq!(args.github_config().read_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_platform() {
        let args = install_args(&["--platform", "plan9-mips"]);
        assert!(args.install_config().is_err());
    }

    #[test]
    fn test_latest_url_override() {
        let args = install_args(&[
            "--releases-url",
            "http://localhost:9000/releases",
            "--latest-url",
            "http://localhost:9000/newest",
        ]);
        let github = args.github_config();
        assert_eq!(github.releases_url, "http://localhost:9000/releases");
        assert_eq!(github.latest_url, "http://localhost:9000/newest");
    }
}
