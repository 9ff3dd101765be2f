use std::path::Path;

use miette::{IntoDiagnostic, WrapErr};
use serde_json::Value;

use catalint_config::Config;
use catalint_validate::{EngineBuilder, render};

use crate::ValidateArgs;

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load `catalint.toml`, searching upward from the catalog's directory for a
/// local catalog and from the working directory otherwise.
fn load_config(catalog: &str) -> anyhow::Result<Config> {
    if !is_url(catalog)
        && let Some(dir) = Path::new(catalog).parent()
        && !dir.as_os_str().is_empty()
    {
        let dir = std::path::absolute(dir)?;
        return Ok(catalint_config::find_and_load(&dir)?.unwrap_or_default());
    }
    catalint_config::load()
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut Config, args: &ValidateArgs) -> miette::Result<()> {
    if args.check_urls {
        config.check_urls = Some(true);
    }
    if args.strict {
        config.strict = Some(true);
    }
    if args.insecure {
        config.url_check.verify_tls = Some(false);
    }
    if let Some(timeout) = &args.timeout {
        let duration = humantime::parse_duration(timeout)
            .into_diagnostic()
            .wrap_err_with(|| format!("invalid --timeout value '{timeout}'"))?;
        if duration.is_zero() {
            miette::bail!("--timeout must be greater than zero");
        }
        config.url_check.timeout_seconds = Some(duration.as_secs_f64());
    }
    if let Some(workers) = args.workers {
        if workers == 0 {
            miette::bail!("--workers must be at least 1");
        }
        config.url_check.workers = Some(workers);
    }
    if let Some(dir) = &args.schema_dir {
        // a file from the config without a dir is a path, not a name in `dir`
        if config.schema.dir.is_none() {
            config.schema.file = None;
        }
        config.schema.dir = Some(dir.clone());
    }
    if let Some(file) = &args.schema_file {
        config.schema.file = Some(file.clone());
    }
    Ok(())
}

async fn load_catalog(source: &str, verify_tls: bool) -> miette::Result<Value> {
    let text = if is_url(source) {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .into_diagnostic()?;
        client
            .get(source)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to fetch {source}"))?
            .text()
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {source}"))?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {source}"))?
    };
    serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("{source} is not valid JSON"))
}

/// Validate one catalog. Returns whether it is valid.
pub async fn run(args: &ValidateArgs) -> miette::Result<bool> {
    let mut config = load_config(&args.catalog)
        .map_err(|e| miette::miette!("failed to load catalint.toml: {e:#}"))?;
    apply_overrides(&mut config, args)?;

    let engine = EngineBuilder::from_config(&config).build()?;
    tracing::debug!(
        validators = ?engine.validator_names().collect::<Vec<_>>(),
        "engine ready"
    );

    let catalog = load_catalog(&args.catalog, config.url_check.verify_tls.unwrap_or(true)).await?;
    let report = engine.validate(&catalog).await;
    let valid = engine.is_valid_report(&report);
    let output = render(report, args.format, args.only_errors, args.export.as_deref())?;

    println!("{valid}");
    match (output, &args.export) {
        (Some(output), _) => {
            let json = serde_json::to_string_pretty(&output).into_diagnostic()?;
            println!("{json}");
        }
        (None, Some(path)) => eprintln!("Exported report to {}", path.display()),
        (None, None) => {}
    }
    Ok(valid)
}
