//! Command handlers.

use miette::{IntoDiagnostic, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use toolcache_core::{Installer, ToolCache};
use toolcache_tools_github::GitHubReleases;
use tracing::{info, warn};

use crate::cli::{InstallArgs, ListArgs};
use crate::output::{OutputFormat, render_install, render_install_failure, render_list};

pub async fn run_install(args: InstallArgs) -> Result<()> {
    let config = args.install_config()?;
    let tool_name = config.tool_name.clone();
    let source = GitHubReleases::new(args.github_config())?;
    let installer = Installer::new(source, config);

    let installation = match installer.install().await {
        Ok(installation) => installation,
        Err(err) => {
            if let Some(lines) = render_install_failure(args.output, &err.to_string()) {
                print!("{lines}");
            }
            return Err(err.into());
        }
    };

    info!(
        version = %installation.version,
        path = %installation.path.display(),
        provenance = ?installation.provenance,
        "Installation ready"
    );

    // Azure output prepends the path itself through a logging command.
    if args.add_to_path && args.output != OutputFormat::Azure {
        match &args.path_file {
            Some(file) => append_path_entry(file, &installation.path)?,
            None => warn!("--add-to-path given but no path file is configured (set GITHUB_PATH or --path-file)"),
        }
    }

    print!(
        "{}",
        render_install(args.output, &tool_name, &installation, args.add_to_path)?
    );
    Ok(())
}

pub fn run_list(args: &ListArgs) -> Result<()> {
    let platform = args.cache.platform()?;
    let cache = ToolCache::new(args.cache.tool_root());
    let versions = cache.list_versions(&args.cache.tool_name, platform.arch);
    print!("{}", render_list(args.output, &versions)?);
    Ok(())
}

/// Append `dir` as one line to a search path file.
fn append_path_entry(file: &Path, dir: &Path) -> Result<()> {
    let mut handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .into_diagnostic()?;
    writeln!(handle, "{}", dir.display()).into_diagnostic()?;
    info!(file = %file.display(), "Added installation to search path");
    Ok(())
}
