//! Template, import and export command handlers.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tabport::models::{JobOptions, RowStatus};
use tabport::{Error, ImportRequest, Result, TabportConfig};

use super::{open_registry, open_service};

/// Failed rows listed after an import.
const MAX_LISTED_FAILURES: usize = 10;

/// Executes the template command.
pub fn cmd_template(config: &TabportConfig, type_name: &str, output: Option<PathBuf>) -> Result<()> {
    let registry = open_registry(config)?;
    let headers = registry.resolve_importer(type_name)?.headers();
    let bytes = tabport::io::template_bytes(&headers)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes).map_err(|e| Error::operation("write_template", e))?;
            println!("Template for [{type_name}] written to {}", path.display());
        },
        None => std::io::stdout()
            .write_all(&bytes)
            .map_err(|e| Error::operation("write_template", e))?,
    }
    Ok(())
}

/// Executes the import command.
pub fn cmd_import(
    config: &TabportConfig,
    type_name: String,
    file: &Path,
    mimetype: Option<String>,
    owner: Option<String>,
) -> Result<()> {
    let service = open_service(config, true)?;
    let bytes = std::fs::read(file).map_err(|e| Error::operation("read_import_file", e))?;

    let mut request = ImportRequest::new(type_name, bytes);
    if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
        request = request.with_original_name(name);
    }
    if let Some(mimetype) = mimetype {
        request = request.with_mimetype(mimetype);
    }
    if let Some(owner) = owner {
        request = request.with_owner(owner);
    }

    let job = service.submit_import(request)?;
    let (_, rows) = service.show(&job.id)?;

    // Clear progress line and print final summary
    eprintln!();
    println!("Import {}:", job.status);
    println!("  Job:      {}", job.id);
    println!("  Total:    {}", job.total_rows);
    println!("  Success:  {}", job.success_rows);
    println!("  Failed:   {}", job.failed_rows);

    let failures: Vec<_> = rows
        .iter()
        .filter(|row| row.status == RowStatus::Failed)
        .collect();
    if !failures.is_empty() {
        println!();
        println!("Failed rows ({}):", failures.len());
        for row in failures.iter().take(MAX_LISTED_FAILURES) {
            println!(
                "  - line {}: {}",
                row.row_index,
                row.message.as_deref().unwrap_or("")
            );
        }
        if failures.len() > MAX_LISTED_FAILURES {
            println!("  ... and {} more", failures.len() - MAX_LISTED_FAILURES);
        }
    }

    Ok(())
}

/// Executes the export command.
pub fn cmd_export(
    config: &TabportConfig,
    type_name: &str,
    filters: &[String],
    output: Option<PathBuf>,
    owner: Option<String>,
) -> Result<()> {
    let filters = parse_filters(filters)?;
    let service = open_service(config, false)?;
    let artifact = service.export(type_name, filters, owner)?;

    match output {
        Some(path) => {
            let mut file = File::create(&path).map_err(|e| Error::operation("create_output", e))?;
            service.deliver(&artifact, &mut file)?;
            println!("Export completed:");
            println!("  Job:      {}", artifact.job.id);
            println!("  Rows:     {}", artifact.job.total_rows);
            println!("  Size:     {} bytes", artifact.size);
            println!("  Output:   {}", path.display());
        },
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            service.deliver(&artifact, &mut lock)?;
            lock.flush().map_err(|e| Error::operation("flush_stdout", e))?;
        },
    }

    Ok(())
}

/// Parses `key=value` filter arguments.
fn parse_filters(filters: &[String]) -> Result<JobOptions> {
    filters
        .iter()
        .map(|filter| {
            let (key, value) = filter
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("filter '{filter}' must be KEY=VALUE"))
                })?;
            Ok((
                key.trim().to_string(),
                serde_json::Value::String(value.to_string()),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let filters =
            parse_filters(&["limit=5".to_string(), "team = ops=dev".to_string()]).unwrap();
        assert_eq!(filters["limit"], "5");
        assert_eq!(filters["team"], " ops=dev");

        assert!(parse_filters(&["limit".to_string()]).is_err());
        assert!(parse_filters(&["=5".to_string()]).is_err());
        assert!(parse_filters(&[]).unwrap().is_empty());
    }
}
