use crate::cli::args::CliArgs;
use crate::entity::RecordId;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    for raw in &args.entity {
        crate::utils::parse_entities_csv(raw).map_err(|e| format!("invalid --entity '{raw}': {e}"))?;
    }
    if let Some(raw) = args.page.as_deref() {
        crate::utils::parse_page_number(raw).map_err(|e| format!("invalid --page '{raw}': {e}"))?;
    }
    if let Some(raw) = args.edit.as_deref() {
        raw.parse::<RecordId>()
            .map_err(|e| format!("invalid --edit '{raw}': {e}"))?;
    }
    for raw in &args.set {
        crate::utils::parse_field_assignment(raw)
            .map_err(|e| format!("invalid --set '{raw}': {e}"))?;
    }
    if args.add && args.edit.is_some() {
        return Err("--add cannot be combined with --edit".to_string());
    }
    if !args.set.is_empty() && args.edit.is_none() && !args.add {
        return Err("--set requires --edit or --add".to_string());
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text, json or html"
            ));
        }
    }
    if let Some(patient) = args.patient.as_deref() {
        let patient = patient.trim();
        if patient.is_empty() || !patient.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid --patient '{patient}', expected a numeric id"));
        }
    }
    Ok(())
}
