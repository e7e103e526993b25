use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use watchful::config::StackConfig;

/// Command-line arguments for the Watchful template generator
#[derive(Parser)]
#[command(
    name = "watchful",
    about = "Generate CloudWatch dashboards and alarms for a stack",
    long_about = "Reads a TOML description of DynamoDB tables, Lambda functions and API Gateway \
                  REST APIs, declares CloudWatch alarms and a dashboard for them, and prints the \
                  resulting CloudFormation template."
)]
struct Cli {
    /// Path to the stack description
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Stack description file path (TOML format)"
    )]
    config: PathBuf,

    /// Where to write the template
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Write the template to FILE instead of stdout"
    )]
    output: Option<PathBuf>,

    /// Override the stack name from the description
    #[arg(long, value_name = "NAME")]
    stack_name: Option<String>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if !self.config.is_file() {
            return Err(format!(
                "Stack description is not a file: {}",
                self.config.display()
            ));
        }
        if let Some(extension) = self.config.extension() {
            if extension != "toml" {
                warn!(
                    "Stack description does not have .toml extension: {}",
                    self.config.display()
                );
            }
        }

        if let Some(output) = &self.output {
            if output.is_dir() {
                return Err(format!("Output path is a directory: {}", output.display()));
            }
        }
        if matches!(&self.stack_name, Some(name) if name.is_empty()) {
            return Err("Stack name must not be empty".to_string());
        }

        Ok(())
    }
}

/// Build the stack described by the CLI arguments and emit its template
fn run(cli: &Cli) -> anyhow::Result<()> {
    info!("Loading stack description from: {}", cli.config.display());
    let mut config = StackConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(name) = &cli.stack_name {
        config.stack_name = name.clone();
    }

    let stack = config.build().context("Failed to build stack")?;
    let template = stack
        .synth_pretty()
        .context("Failed to synthesize template")?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", template))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote template for '{}' ({} resources) to {}",
                stack.name(),
                stack.resources().len(),
                path.display()
            );
        }
        None => println!("{}", template),
    }
    Ok(())
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const STACK: &str = r#"
stack_name = "Orders"

[[tables]]
id = "Orders"
partition_key = "ID"
"#;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn cli(config: PathBuf) -> Cli {
        Cli {
            config,
            output: None,
            stack_name: None,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let file = config_file(STACK);
        assert!(cli(file.path().to_path_buf()).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        let cli = cli(PathBuf::from("/nonexistent/stack.toml"));
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = TempDir::new().unwrap();
        assert!(cli(dir.path().to_path_buf()).validate().is_err());
    }

    #[test]
    fn test_cli_validation_output_directory() {
        let file = config_file(STACK);
        let dir = TempDir::new().unwrap();
        let mut cli = cli(file.path().to_path_buf());
        cli.output = Some(dir.path().to_path_buf());
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_empty_stack_name() {
        let file = config_file(STACK);
        let mut cli = cli(file.path().to_path_buf());
        cli.stack_name = Some(String::new());
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_run_writes_template() {
        let file = config_file(STACK);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("template.json");
        let mut cli = cli(file.path().to_path_buf());
        cli.output = Some(output.clone());
        cli.stack_name = Some("Renamed".to_string());

        run(&cli).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let template: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            template["Resources"]["watchfulDashboard"]["Type"],
            "AWS::CloudWatch::Dashboard"
        );
        assert_eq!(
            template["Resources"]["watchfulOrdersThrottledRequestsAlarm"]["Type"],
            "AWS::CloudWatch::Alarm"
        );
    }

    #[test]
    fn test_run_reports_invalid_config() {
        let file = config_file("[watchful]\ndashboard = false\ndashboard_name = \"Test\"\n");
        let error = run(&cli(file.path().to_path_buf())).unwrap_err();
        assert!(format!("{:#}", error).contains("dashboard creation is disabled"));
    }
}
