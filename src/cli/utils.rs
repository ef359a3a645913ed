use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::models::AccessGrant;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output the grant table, newest first
pub fn output_grants(output_format: OutputFormat, grants: &[AccessGrant]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "grants": grants }))?);
        }
        OutputFormat::Text if grants.is_empty() => {
            println!("No access grants");
        }
        OutputFormat::Text => {
            println!(
                "{:<6} {:<40} {:<20} {:>10} {:>10}  {}",
                "ID", "IP", "EXPIRES", "REMAINING", "LOADED", "DESCRIPTION"
            );
            for grant in grants {
                println!(
                    "{:<6} {:<40} {:<20} {:>10} {:>10}  {}",
                    grant.id,
                    grant.ip,
                    grant.expires_at.format("%Y-%m-%d %H:%M:%S"),
                    grant.monthly_limit,
                    grant.total_loaded,
                    grant.description.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
