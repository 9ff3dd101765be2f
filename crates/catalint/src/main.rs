use std::path::PathBuf;
use std::process::ExitCode;

use bpaf::Bpaf;
use catalint_reporters::ResponseFormat;
use tracing_subscriber::prelude::*;

mod commands;

#[derive(Debug, Clone, Bpaf)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidateArgs {
    /// Output shape: dict (hierarchical report) or list (flat rows)
    #[bpaf(
        long("format"),
        argument("FORMAT"),
        fallback(ResponseFormat::Dict),
        display_fallback
    )]
    pub format: ResponseFormat,

    /// Keep only the datasets that have errors
    #[bpaf(long("only-errors"), switch)]
    pub only_errors: bool,

    /// Write the rows to a .csv or .xlsx file instead of printing the report
    #[bpaf(long("export"), argument("PATH"))]
    pub export: Option<PathBuf>,

    /// Check landing pages and distribution URLs
    #[bpaf(long("check-urls"), switch)]
    pub check_urls: bool,

    /// Per-request timeout for URL checks (e.g. "1s", "500ms"); default 1s
    #[bpaf(long("timeout"), argument("DURATION"))]
    pub timeout: Option<String>,

    /// Maximum number of URL checks in flight; default 10
    #[bpaf(long("workers"), argument("N"))]
    pub workers: Option<usize>,

    /// Do not verify TLS certificates
    #[bpaf(long("insecure"), switch)]
    pub insecure: bool,

    /// Directory holding the JSON Schemas (defaults to the bundled schemas)
    #[bpaf(long("schema-dir"), argument("DIR"))]
    pub schema_dir: Option<PathBuf>,

    /// Master schema file inside the schema directory, or a path to it
    #[bpaf(long("schema-file"), argument("FILE"))]
    pub schema_file: Option<String>,

    /// Fail when a custom check cannot run
    #[bpaf(long("strict"), switch)]
    pub strict: bool,

    /// Catalog to validate: a JSON file or an http(s) URL
    #[bpaf(positional("CATALOG"))]
    pub catalog: String,
}

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version, fallback_to_usage)]
/// Validate data catalogs against JSON Schema and catalog consistency rules
struct Cli {
    #[bpaf(external(commands))]
    command: Commands,
}

#[derive(Debug, Clone, Bpaf)]
enum Commands {
    #[bpaf(command("validate"))]
    /// Validate a catalog and print its report
    Validate(#[bpaf(external(validate_args))] ValidateArgs),

    #[bpaf(command("config-schema"))]
    /// Print the JSON Schema of catalint.toml
    ConfigSchema,

    #[bpaf(command("version"))]
    /// Print version information
    Version,
}

fn init_tracing() {
    if let Ok(filter) = tracing_subscriber::EnvFilter::try_from_env("CATALINT_LOG") {
        tracing_subscriber::registry()
            .with(
                tracing_tree::HierarchicalLayer::new(2)
                    .with_targets(true)
                    .with_bracketed_fields(true)
                    .with_indent_lines(true)
                    .with_timer(tracing_tree::time::Uptime::default())
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();
    init_tracing();

    let cli = cli().run();

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::run(&args).await,
        Commands::ConfigSchema => match commands::config_schema::run() {
            Ok(()) => return ExitCode::SUCCESS,
            Err(e) => Err(e),
        },
        Commands::Version => {
            println!("catalint {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_validate_defaults() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&["validate", "data.json"])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.catalog, "data.json");
                assert_eq!(args.format, ResponseFormat::Dict);
                assert!(!args.only_errors);
                assert!(args.export.is_none());
                assert!(!args.check_urls);
                assert!(args.timeout.is_none());
                assert!(args.workers.is_none());
                assert!(!args.insecure);
                assert!(!args.strict);
            }
            _ => panic!("expected Validate"),
        }
        Ok(())
    }

    #[test]
    fn cli_parses_validate_all_options() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&[
                "validate",
                "https://example.org/data.json",
                "--format",
                "list",
                "--only-errors",
                "--export",
                "report.xlsx",
                "--check-urls",
                "--timeout",
                "2s",
                "--workers",
                "4",
                "--insecure",
                "--schema-dir",
                "schemas",
                "--schema-file",
                "root.json",
                "--strict",
            ])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.catalog, "https://example.org/data.json");
                assert_eq!(args.format, ResponseFormat::List);
                assert!(args.only_errors);
                assert_eq!(args.export, Some(PathBuf::from("report.xlsx")));
                assert!(args.check_urls);
                assert_eq!(args.timeout.as_deref(), Some("2s"));
                assert_eq!(args.workers, Some(4));
                assert!(args.insecure);
                assert_eq!(args.schema_dir, Some(PathBuf::from("schemas")));
                assert_eq!(args.schema_file.as_deref(), Some("root.json"));
                assert!(args.strict);
            }
            _ => panic!("expected Validate"),
        }
        Ok(())
    }

    #[test]
    fn cli_rejects_unknown_format() {
        let result = cli().run_inner(&["validate", "data.json", "--format", "table"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_validate_requires_catalog() {
        assert!(cli().run_inner(&["validate"]).is_err());
    }

    #[test]
    fn cli_parses_config_schema() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&["config-schema"])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert!(matches!(cli.command, Commands::ConfigSchema));
        Ok(())
    }
}
