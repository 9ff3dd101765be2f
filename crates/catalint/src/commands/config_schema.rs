use miette::IntoDiagnostic;

/// Print the JSON Schema of `catalint.toml`.
pub fn run() -> miette::Result<()> {
    let schema = serde_json::to_string_pretty(&catalint_config::schema()).into_diagnostic()?;
    println!("{schema}");
    Ok(())
}
