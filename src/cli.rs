//! Command line front end
//!
//! ```bash
//! # All stacks, every page
//! awsinvoke ListStacks
//!
//! # One page, resuming from a cursor
//! awsinvoke emr-serverless:ListJobRuns -p applicationId=00f1 --next-token abc
//!
//! # One invocation per stdin line
//! printf 'web\ndb\n' | awsinvoke DescribeStackEvents --pipe StackName --output text
//! ```

use crate::aws::client::{error_hint, AwsClients};
use crate::aws::credentials::ProfileFiles;
use crate::config::ConnectionConfig;
use crate::logging::LogFormat;
use crate::operation::invoker::PaginationMode;
use crate::operation::path_extractor::value_to_string;
use crate::operation::registry::Registry;
use crate::operation::{
    registry, run_batch, BatchEvent, BoundParams, InvokeOptions, OperationDescriptor, Page,
    Selector,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "awsinvoke")]
#[command(version)]
#[command(about = "Invoke paginated AWS operations from a data-driven operation table")]
pub struct Cli {
    /// Operation name (e.g. ListStacks or emr-serverless:ListJobRuns)
    #[arg(required_unless_present = "list")]
    pub operation: Option<String>,

    /// Bind a parameter; repeat a name to build a list
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Fetch one page starting at this cursor
    #[arg(long, value_name = "TOKEN")]
    pub next_token: Option<String>,

    /// Output selection: '*' for the whole response, '^Name' to echo a parameter, or a path
    #[arg(long, value_name = "SELECTOR")]
    pub select: Option<String>,

    /// Read stdin lines, binding each to this parameter (one invocation per line)
    #[arg(long, value_name = "NAME")]
    pub pipe: Option<String>,

    /// Skip the confirmation prompt for mutating operations
    #[arg(long)]
    pub force: bool,

    #[arg(long, value_enum, default_value_t)]
    pub output: OutputFormat,

    /// Include the full response envelope in JSON output
    #[arg(long)]
    pub envelope: bool,

    /// List known operations and exit
    #[arg(long)]
    pub list: bool,

    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom endpoint for every service (e.g. LocalStack)
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per page
    #[default]
    Json,
    /// One line per record
    Text,
}

/// Parameters bound on the command line, with `--next-token` bound to the
/// operation's cursor field
pub fn base_params(cli: &Cli, descriptor: &OperationDescriptor) -> Result<BoundParams> {
    let mut params = BoundParams::from_assignments(&cli.params)?;
    if let Some(token) = &cli.next_token {
        let field = descriptor
            .cursor_field()
            .ok_or_else(|| anyhow!("{} is not paginated; --next-token does not apply", descriptor.name))?;
        params.bind(field.name.clone(), token.clone());
    }
    Ok(params)
}

/// One parameter set per input: the base set alone, or one per non-empty
/// line of `reader` with the line bound to `pipe`
pub fn batch_inputs(
    base: &BoundParams,
    pipe: Option<&str>,
    reader: impl BufRead,
) -> Result<Vec<BoundParams>> {
    let Some(name) = pipe else {
        return Ok(vec![base.clone()]);
    };

    let mut inputs = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read stdin")?;
        let value = line.trim();
        if value.is_empty() {
            continue;
        }
        let mut params = base.clone();
        params.bind(name.to_string(), value.to_string());
        inputs.push(params);
    }
    debug!("Read {} piped input(s) for {}", inputs.len(), name);
    Ok(inputs)
}

/// Ask before running a mutating operation. Returns whether to proceed.
pub fn confirm(
    descriptor: &OperationDescriptor,
    inputs: usize,
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> Result<bool> {
    write!(
        prompt,
        "Invoke {}:{} for {} input(s)? [y/N] ",
        descriptor.service, descriptor.name, inputs
    )?;
    prompt.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Write one page to `out`
pub fn render_page(
    page: &Page,
    format: OutputFormat,
    include_envelope: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(&page.to_json(include_envelope))?;
            writeln!(out, "{}", line)
        }
        OutputFormat::Text => {
            for record in page.records() {
                writeln!(out, "{}", record_line(&record))?;
            }
            Ok(())
        }
    }
}

fn record_line(record: &Value) -> String {
    match record {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, value_to_string(v, "-")))
            .collect::<Vec<_>>()
            .join("\t"),
        other => value_to_string(other, "-"),
    }
}

/// Tab-separated listing of the operation table
pub fn list_operations(registry: &Registry, out: &mut impl Write) -> io::Result<()> {
    for op in registry.operations() {
        let paging = match &op.pagination {
            Some(p) => format!("paginated({})", p.input_token),
            None => "single".to_string(),
        };
        writeln!(
            out,
            "{}\t{}\t{:?}\t{}{}",
            op.service,
            op.name,
            op.protocol,
            paging,
            if op.confirm { "\tconfirm" } else { "" }
        )?;
    }
    Ok(())
}

/// Run the command; returns the process exit code
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<u8> {
    let registry = registry()?;

    if cli.list {
        list_operations(registry, &mut io::stdout().lock())?;
        return Ok(EXIT_OK);
    }

    let name = cli.operation.as_deref().unwrap_or_default();
    let descriptor = registry
        .get(name)
        .ok_or_else(|| anyhow!("Unknown operation '{}'; see --list", name))?;

    let base = base_params(&cli, descriptor)?;
    let inputs = batch_inputs(&base, cli.pipe.as_deref(), io::stdin().lock())?;

    if descriptor.confirm && !cli.force {
        if cli.pipe.is_some() {
            bail!("{} changes resources; use --force with --pipe", descriptor.name);
        }
        if !confirm(descriptor, inputs.len(), &mut io::stdin().lock(), &mut io::stderr())? {
            eprintln!("Aborted.");
            return Ok(EXIT_FAILED);
        }
    }

    let region = cli
        .region
        .clone()
        .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok());
    let files = ProfileFiles::locate().ok();
    let connection = ConnectionConfig::resolve(
        cli.profile.clone(),
        region,
        cli.endpoint_url.clone(),
        files.as_ref(),
    );
    let clients = AwsClients::new(
        &connection.profile,
        &connection.region,
        connection.endpoint_url.clone(),
    )
    .await
    .with_context(|| format!("Failed to create AWS client for profile '{}'", connection.profile))?;

    let options = InvokeOptions {
        selector: cli
            .select
            .as_deref()
            .map(|s| Selector::from_str(s).unwrap_or_default())
            .unwrap_or_default(),
        cancel,
    };

    let batch = inputs.len() > 1 || cli.pipe.is_some();
    let mut stdout = io::stdout().lock();
    let mut write_error: Option<io::Error> = None;

    let summary = run_batch(&clients, descriptor, &inputs, &options, |index, event| {
        match event {
            BatchEvent::Page(page) => {
                if write_error.is_none() {
                    if let Err(e) = render_page(&page, cli.output, cli.envelope, &mut stdout) {
                        write_error = Some(e);
                    }
                }
            }
            BatchEvent::Failed(failure) => {
                if batch {
                    eprintln!("Error [input {}]: {}", index + 1, failure.error);
                } else {
                    eprintln!("Error: {}", failure.error);
                }
                if failure.outcome.pages > 0 {
                    eprintln!("  after {} page(s)", failure.outcome.pages);
                }
                if let Some(hint) = error_hint(&failure.error) {
                    eprintln!("  hint: {}", hint);
                }
            }
            BatchEvent::Finished(outcome) => {
                if outcome.mode == PaginationMode::Manual && cli.output == OutputFormat::Text {
                    if let Some(cursor) = &outcome.last_cursor {
                        eprintln!("NextToken: {}", cursor);
                    }
                }
            }
        }
    })
    .await;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write output");
    }

    Ok(if summary.cancelled {
        EXIT_CANCELLED
    } else if summary.all_succeeded() {
        EXIT_OK
    } else {
        EXIT_FAILED
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("awsinvoke").chain(args.iter().copied())).unwrap()
    }

    fn describe_stack_events() -> &'static OperationDescriptor {
        registry().unwrap().get("DescribeStackEvents").unwrap()
    }

    #[test]
    fn test_parse_arguments() {
        let cli = cli(&[
            "ListJobRuns",
            "-p",
            "applicationId=00f1",
            "--param",
            "states=RUNNING",
            "--select",
            "*",
            "--output",
            "text",
        ]);
        assert_eq!(cli.operation.as_deref(), Some("ListJobRuns"));
        assert_eq!(cli.params, vec!["applicationId=00f1", "states=RUNNING"]);
        assert_eq!(cli.select.as_deref(), Some("*"));
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.force);
    }

    #[test]
    fn test_operation_required_unless_listing() {
        assert!(Cli::try_parse_from(["awsinvoke"]).is_err());
        assert!(cli(&["--list"]).list);
    }

    #[test]
    fn test_next_token_binds_cursor_field() {
        let params = base_params(
            &cli(&["DescribeStackEvents", "-p", "StackName=web", "--next-token", "abc"]),
            describe_stack_events(),
        )
        .unwrap();
        assert_eq!(params.get("NextToken"), Some(&json!("abc")));
        assert_eq!(params.get("StackName"), Some(&json!("web")));
    }

    #[test]
    fn test_next_token_rejected_for_single_page_operation() {
        let get_template = registry().unwrap().get("GetTemplate").unwrap();
        let err = base_params(&cli(&["GetTemplate", "--next-token", "abc"]), get_template)
            .unwrap_err();
        assert!(err.to_string().contains("not paginated"));
    }

    #[test]
    fn test_batch_inputs_from_lines() {
        let base = BoundParams::new().with("MaxResults", "5");
        let inputs = batch_inputs(&base, Some("StackName"), Cursor::new("web\n\n  db  \n")).unwrap();

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].get("StackName"), Some(&json!("web")));
        assert_eq!(inputs[1].get("StackName"), Some(&json!("db")));
        assert_eq!(inputs[1].get("MaxResults"), Some(&json!("5")));

        let single = batch_inputs(&base, None, Cursor::new("ignored")).unwrap();
        assert_eq!(single, vec![base]);
    }

    #[test]
    fn test_confirm_answers() {
        let delete = registry().unwrap().get("DeleteStack").unwrap();
        let mut prompt = Vec::new();

        assert!(confirm(delete, 1, &mut Cursor::new("y\n"), &mut prompt).unwrap());
        assert!(confirm(delete, 1, &mut Cursor::new("YES\n"), &mut prompt).unwrap());
        assert!(!confirm(delete, 1, &mut Cursor::new("\n"), &mut prompt).unwrap());
        assert!(!confirm(delete, 1, &mut Cursor::new(""), &mut prompt).unwrap());
        assert!(String::from_utf8(prompt)
            .unwrap()
            .starts_with("Invoke cloudformation:DeleteStack for 1 input(s)?"));
    }

    #[test]
    fn test_render_json_page() {
        let page = Page {
            page_number: 1,
            payload: json!([{"StackName": "web"}]),
            cursor: Some("next".to_string()),
            envelope: json!({"NextToken": "next"}),
        };
        let mut out = Vec::new();
        render_page(&page, OutputFormat::Json, false, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"_next_token\":\"next\",\"payload\":[{\"StackName\":\"web\"}]}\n"
        );
    }

    #[test]
    fn test_render_text_records() {
        let page = Page {
            page_number: 1,
            payload: json!([
                {"StackName": "web", "StackStatus": "CREATE_COMPLETE"},
                {"StackName": "db", "DeletionTime": null}
            ]),
            cursor: None,
            envelope: Value::Null,
        };
        let mut out = Vec::new();
        render_page(&page, OutputFormat::Text, false, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "StackName=web\tStackStatus=CREATE_COMPLETE\nDeletionTime=-\tStackName=db\n"
        );
    }

    #[test]
    fn test_list_operations() {
        let mut out = Vec::new();
        list_operations(registry().unwrap(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("cloudformation\tListStacks\tQuery\tpaginated(NextToken)\n"));
        assert!(text.contains("cloudformation\tDeleteStack\tQuery\tsingle\tconfirm\n"));
        assert!(text.contains("emr-serverless\tListJobRuns\tRestJson\tpaginated(nextToken)\n"));
    }
}
