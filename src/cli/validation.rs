use crate::cli::args::{CliArgs, Command};

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --output-format '{raw}', expected text or json"));
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.base_url.as_deref() {
        url::Url::parse(raw).map_err(|e| format!("invalid --base-url '{raw}': {e}"))?;
    }
    match &args.command {
        Command::Lookup { field, .. } => {
            if crate::registry::CouncilField::parse(field).is_none() {
                return Err(format!("invalid --field '{field}'"));
            }
        }
        Command::Suggest { max_items, .. } => {
            if *max_items == Some(0) {
                return Err("invalid --max, expected positive integer".to_string());
            }
        }
        Command::Select { variant, .. } => {
            if crate::autocomplete::Variant::parse(variant).is_none() {
                return Err(format!(
                    "invalid --variant '{variant}', expected search, jump, compare or methodology"
                ));
            }
        }
        Command::Sort { column, by, .. } => {
            if column.is_some() == by.is_some() {
                return Err("sort needs exactly one of --column or --by".to_string());
            }
        }
        Command::Reload { link, fields, .. } => {
            if link.is_some() == !fields.is_empty() {
                return Err("reload needs exactly one of --link or --field".to_string());
            }
            for raw in fields {
                crate::utils::parse_key_value(raw)
                    .map_err(|e| format!("invalid --field '{raw}': {e}"))?;
            }
        }
        Command::Track { params, .. } => {
            for raw in params {
                crate::utils::parse_key_value(raw)
                    .map_err(|e| format!("invalid --param '{raw}': {e}"))?;
            }
        }
        Command::Form { kind, fields, .. } => {
            if crate::interstitial::FormKind::parse(kind).is_none() {
                return Err(format!("invalid --kind '{kind}', expected ajax or feedback"));
            }
            for raw in fields {
                crate::utils::parse_key_value(raw)
                    .map_err(|e| format!("invalid --field '{raw}': {e}"))?;
            }
        }
        Command::Codec { .. }
        | Command::Uncompare { .. }
        | Command::Copy { .. }
        | Command::Navbar { .. }
        | Command::Interstitial { .. }
        | Command::Locate { .. }
        | Command::InitConfig { .. } => {}
    }
    Ok(())
}
