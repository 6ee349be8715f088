//! Job inspection command handlers.

use tabport::models::{Direction, JobId, JobQuery, JobStatus};
use tabport::{Error, Result, TabportConfig};

use super::open_service;

/// Executes the jobs list command.
pub fn cmd_jobs_list(
    config: &TabportConfig,
    type_name: Option<String>,
    direction: Option<String>,
    status: Option<String>,
    page: u32,
    per_page: Option<u32>,
) -> Result<()> {
    let mut query = JobQuery::default().with_page(page, per_page.unwrap_or(JobQuery::DEFAULT_PER_PAGE));
    if let Some(type_name) = type_name {
        query = query.with_type(type_name);
    }
    if let Some(direction) = direction {
        query = query.with_direction(parse_direction(&direction)?);
    }
    if let Some(status) = status {
        query = query.with_status(parse_status(&status)?);
    }

    let service = open_service(config, false)?;
    let result = service.jobs(&query)?;

    if result.items.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<12} {:<6}  {:<10} {:>7} {:>7} {:>7}",
        "ID", "TYPE", "DIR", "STATUS", "TOTAL", "OK", "FAILED"
    );
    for job in &result.items {
        println!(
            "{:<36}  {:<12} {:<6}  {:<10} {:>7} {:>7} {:>7}",
            job.id,
            job.type_name,
            job.direction,
            job.status,
            job.total_rows,
            job.success_rows,
            job.failed_rows
        );
    }
    println!();
    println!(
        "Page {} of {} ({} jobs)",
        result.page,
        result.last_page(),
        result.total
    );

    Ok(())
}

/// Executes the jobs show command.
pub fn cmd_jobs_show(config: &TabportConfig, id: &str) -> Result<()> {
    let service = open_service(config, false)?;
    let (job, rows) = service.show(&JobId::new(id))?;

    println!("Job {}", job.id);
    println!("  Type:       {}", job.type_name);
    println!("  Direction:  {}", job.direction);
    println!("  Status:     {}", job.status);
    println!("  Disk:       {}", job.disk);
    if !job.path.is_empty() {
        println!("  Path:       {}", job.path);
    }
    if let Some(name) = &job.original_name {
        println!("  File:       {name}");
    }
    if let Some(size) = job.size {
        println!("  Size:       {size} bytes");
    }
    println!(
        "  Rows:       {} total, {} ok, {} failed",
        job.total_rows, job.success_rows, job.failed_rows
    );
    if !job.options.is_empty() {
        let options = serde_json::to_string(&job.options)
            .map_err(|e| Error::operation("serialize_options", e))?;
        println!("  Options:    {options}");
    }

    if !rows.is_empty() {
        println!();
        for row in &rows {
            let payload = row.payload.to_json()?;
            match &row.message {
                Some(message) => println!("  {:>5}  {:<9} {payload}  {message}", row.row_index, row.status),
                None => println!("  {:>5}  {:<9} {payload}", row.row_index, row.status),
            }
        }
    }

    Ok(())
}

fn parse_direction(s: &str) -> Result<Direction> {
    Direction::parse(s)
        .ok_or_else(|| Error::InvalidInput(format!("unknown direction '{s}', expected import or export")))
}

fn parse_status(s: &str) -> Result<JobStatus> {
    JobStatus::parse(s).ok_or_else(|| {
        let known: Vec<&str> = JobStatus::all().iter().map(JobStatus::as_str).collect();
        Error::InvalidInput(format!("unknown status '{s}', expected one of {}", known.join(", ")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direction() {
        assert_eq!(parse_direction("export").unwrap(), Direction::Export);
        assert!(parse_direction("sideways").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("partial").unwrap(), JobStatus::Partial);
        let err = parse_status("done").unwrap_err().to_string();
        assert!(err.contains("uploaded"));
    }
}
