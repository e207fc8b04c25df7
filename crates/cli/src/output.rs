//! Rendering of command results for humans, scripts and Azure Pipelines.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use toolcache_core::Installation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text on stdout
    Text,
    /// A single JSON document on stdout
    Json,
    /// Azure Pipelines logging commands
    Azure,
}

/// Name of the pipeline variable receiving the install path, e.g. `CodeQLLocation`.
pub fn location_variable(tool_name: &str) -> String {
    format!("{tool_name}Location")
}

/// Escape a value for use inside an Azure Pipelines logging command.
pub fn escape_azure(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace(']', "%5D")
        .replace(';', "%3B")
}

pub fn render_install(
    format: OutputFormat,
    tool_name: &str,
    installation: &Installation,
    add_to_path: bool,
) -> miette::Result<String> {
    let path = installation.path.display().to_string();
    match format {
        OutputFormat::Text => Ok(format!("{path}\n")),
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(installation)
                .map_err(|e| miette::miette!("Failed to serialize installation: {e}"))?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Azure => {
            let escaped = escape_azure(&path);
            let mut out = String::new();
            let _ = writeln!(
                out,
                "##vso[task.setvariable variable={}]{escaped}",
                location_variable(tool_name)
            );
            if add_to_path {
                let _ = writeln!(out, "##vso[task.prependpath]{escaped}");
            }
            let _ = writeln!(out, "##vso[task.complete result=Succeeded;]");
            Ok(out)
        }
    }
}

/// Azure failure lines; other formats leave failures to the error report on stderr.
pub fn render_install_failure(format: OutputFormat, message: &str) -> Option<String> {
    match format {
        OutputFormat::Azure => Some(format!(
            "##vso[task.logissue type=error]{}\n##vso[task.complete result=Failed;]\n",
            escape_azure(message)
        )),
        OutputFormat::Text | OutputFormat::Json => None,
    }
}

pub fn render_list(format: OutputFormat, versions: &BTreeSet<String>) -> miette::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(versions)
                .map_err(|e| miette::miette!("Failed to serialize versions: {e}"))?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Text | OutputFormat::Azure => {
            Ok(versions.iter().fold(String::new(), |mut out, v| {
                let _ = writeln!(out, "{v}");
                out
            }))
        }
    }
}
