//! CLI command implementations.

use anyhow::{Context, Result, bail};
use pipekit_assembler::{Assembler, AssemblyReport, ResourceGraph};
use pipekit_config::{DeploymentConfig, load_definition};
use std::io::Write;
use tracing::info;

/// Deployment target overrides given on the command line.
pub struct Target {
    pub region: Option<String>,
    pub account: Option<String>,
    pub partition: Option<String>,
    pub connections: Vec<String>,
}

impl Target {
    /// Process environment with command-line overrides applied on top.
    fn deployment_config(&self) -> Result<DeploymentConfig> {
        let mut vars: Vec<(String, String)> = std::env::vars().collect();

        let overrides = [
            ("PIPEKIT_REGION", &self.region),
            ("PIPEKIT_ACCOUNT", &self.account),
            ("PIPEKIT_PARTITION", &self.partition),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                vars.push((key.to_string(), value.clone()));
            }
        }

        for connection in &self.connections {
            let Some((name, id)) = connection.split_once('=') else {
                bail!("invalid --connection '{}', expected NAME=ID", connection);
            };
            vars.push((
                format!(
                    "PIPEKIT_CONNECTION_{}",
                    name.trim().to_uppercase().replace('-', "_")
                ),
                id.trim().to_string(),
            ));
        }

        DeploymentConfig::from_vars(vars).context("invalid deployment target")
    }
}

fn assemble(target: &Target, path: &str) -> Result<std::result::Result<ResourceGraph, AssemblyReport>> {
    let config = target.deployment_config()?;
    let definition =
        load_definition(path).with_context(|| format!("failed to load definition from {}", path))?;
    info!(path, stack = %definition.name, "Loaded definition");
    Ok(Assembler::new(config).assemble(&definition))
}

/// Failure reports go to stderr; stdout carries the graph.
fn print_report(report: &AssemblyReport) {
    let _ = write_report(&mut std::io::stderr().lock(), report);
}

fn write_report(out: &mut impl Write, report: &AssemblyReport) -> std::io::Result<()> {
    writeln!(out, "Configuration error: {}", report)
}

fn render_graph(graph: &ResourceGraph, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(graph)?
    } else {
        serde_json::to_string(graph)?
    };
    Ok(json)
}

pub fn validate(target: &Target, path: &str) -> Result<()> {
    match assemble(target, path)? {
        Ok(_graph) => {
            println!("Configuration is valid");
            Ok(())
        }
        Err(report) => {
            print_report(&report);
            std::process::exit(1);
        }
    }
}

pub fn synth(target: &Target, path: &str, output: Option<&str>, pretty: bool) -> Result<()> {
    let graph = match assemble(target, path)? {
        Ok(graph) => graph,
        Err(report) => {
            print_report(&report);
            std::process::exit(1);
        }
    };

    let json = render_graph(&graph, pretty)?;

    match output {
        Some(file) => {
            std::fs::write(file, json + "\n")
                .with_context(|| format!("failed to write {}", file))?;
            info!(file, "Resource graph written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipekit_config::parse_definition;

    fn config() -> DeploymentConfig {
        DeploymentConfig::from_vars([
            ("PIPEKIT_REGION".to_string(), "us-east-1".to_string()),
            ("PIPEKIT_ACCOUNT".to_string(), "123456789012".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn test_report_is_written_to_given_stream() {
        let definition = parse_definition(
            r#"
            stack "broken"
            grant "Nobody" on="Nowhere" capability="read"
            "#,
        )
        .unwrap();
        let report = Assembler::new(config()).assemble(&definition).unwrap_err();

        let mut err = Vec::new();
        write_report(&mut err, &report).unwrap();
        let err = String::from_utf8(err).unwrap();
        assert!(err.starts_with("Configuration error: assembly failed with 1 error(s):"));
    }

    #[test]
    fn test_graph_output_is_plain_json() {
        let definition = parse_definition(r#"stack "empty""#).unwrap();
        let graph = Assembler::new(config()).assemble(&definition).unwrap();

        let json = render_graph(&graph, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stack"], "empty");
    }
}
