use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::time::Instant;

use crate::api::{ApiClient, CollectionStats, FetchBatch, FetchPolicy, FetchState, Session, MAX_FETCH_ATTEMPTS};
use crate::cli::args::{
    BrowseArgs, CliArgs, Command, CreateArgs, DeleteArgs, ExportArgs, ListArgs, LoginArgs,
    SetStatusArgs, UpdateArgs,
};
use crate::cli::validation::{self, PageArg};
use crate::config::{self, ConfigFile};
use crate::export::{self, ExportFormat, Exportable};
use crate::page::{PageRequest, DEFAULT_PAGE_SIZE};
use crate::query::{FilterFlag, QueryState, Queryable, SortKey};
use crate::records::{Booking, BookingStatus, Collection, Inquiry, Spa, User};
use crate::view::ListView;

const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1";
const DEFAULT_TIMEOUT: u64 = 30;

fn print_banner(no_color: bool) {
    let _ = no_color;
    const BANNER: &str = r#"
   _________  ____ _____/ /___ ___  (_)___
  / ___/ __ \/ __ `/ __  / __ `__ \/ / __ \
 (__  ) /_/ / /_/ / /_/ / / / / / / / / / /
/____/ .___/\__,_/\__,_/_/ /_/ /_/_/_/ /_/
    /_/
       v0.3.2 - spa-booking admin client
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    if let Some(version) = cmd.get_version() {
        out.push_str(cmd.get_name());
        out.push(' ');
        out.push_str(version);
        out.push('\n');
    } else {
        out.push_str(cmd.get_name());
        out.push('\n');
    }

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(cmd.get_name());
    out.push_str(" <COMMAND> [OPTIONS]\n\n");

    out.push_str("Commands:\n");
    for sub in cmd.get_subcommands() {
        if sub.is_hide_set() {
            continue;
        }
        out.push_str(&format!("  {:<12}", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&about.to_string());
        }
        out.push('\n');
    }
    out.push('\n');

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }

        let heading = arg.get_help_heading().unwrap_or("Options").to_string();

        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };

        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();

            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }

            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }

            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");

            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push(' ');
                flags.push_str(&format!("<{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }

            out.push('\n');
        }
    }

    out
}

/// Per-cell color hook for one named column of a table.
type CellStyle = fn(&str) -> Option<colored::Color>;

fn booking_status_style(cell: &str) -> Option<colored::Color> {
    BookingStatus::parse(cell).map(|status| status.color())
}

fn print_table(headers: &[&str], rows: &[Vec<String>], style: Option<(&'static str, CellStyle)>) {
    let styled_column = style.and_then(|(name, _)| headers.iter().position(|h| *h == name));

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut header_line = String::new();
    let mut band_line = String::new();
    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            header_line.push_str("  ");
            band_line.push_str("  ");
        }
        header_line.push_str(&format!("{:<width$}", header, width = widths[i]));
        band_line.push_str(&"-".repeat(widths[i]));
    }
    println!("{}", header_line.trim_end());
    println!("{}", band_line);

    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            if i > 0 {
                line.push_str("  ");
            }
            let padded = format!("{:<width$}", cell, width = widths[i]);
            match (styled_column, style) {
                (Some(column), Some((_, style_fn))) if column == i => match style_fn(cell) {
                    Some(color) => line.push_str(&padded.as_str().color(color).to_string()),
                    None => line.push_str(&padded),
                },
                _ => line.push_str(&padded),
            }
        }
        println!("{}", line.trim_end());
    }
}

fn describe_query(query: &QueryState) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !query.search.is_empty() {
        parts.push(format!("search='{}'", query.search));
    }
    if query.sort != SortKey::default() {
        parts.push(format!("sort={}", query.sort.label()));
    }
    for flag in &query.filters {
        parts.push(flag.label().to_string());
    }
    parts.join(" ")
}

fn print_view_page<T>(view: &ListView<T>, style: Option<(&'static str, CellStyle)>)
where
    T: Queryable + Exportable,
{
    let (records, info) = view.current();
    let rows = export::to_rows(&records);
    println!();
    if !view.query().is_default() {
        format_kv_line("Query", &describe_query(view.query()));
    }
    print_table(T::headers(), &rows, style);
    println!(
        "Showing {}-{} of {} (page {} of {})",
        info.range_start, info.range_end, info.total, info.page, info.total_pages
    );
}

fn build_fetch_progress(collection: Collection) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: {spinner} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message(format!("fetching {collection}"));
    Ok(pb)
}

async fn fetch_collection<T>(
    client: &ApiClient,
    collection: Collection,
    run: &RunConfig,
) -> Result<FetchBatch<T>, String>
where
    T: DeserializeOwned,
{
    let pb = if run.quiet {
        None
    } else {
        Some(build_fetch_progress(collection)?)
    };
    let mut state = FetchState::Idle;
    let result = client
        .fetch_all_with_retry::<T>(collection, run.policy(), &mut state, pb.as_ref())
        .await;
    if let Some(pb) = pb.as_ref() {
        pb.finish_and_clear();
    }
    let batch = result.map_err(|e| e.to_string())?;
    if batch.skipped > 0 {
        format_kv_line(
            "Skipped",
            &format!("{} records failed to decode and were dropped", batch.skipped),
        );
    }
    Ok(batch)
}

async fn read_payload(data: Option<&str>, data_file: Option<&str>) -> Result<serde_json::Value, String> {
    let raw = match (data, data_file) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(config::expand_tilde_string(path))
            .await
            .map_err(|e| format!("failed to read payload file {path}: {e}"))?,
        (None, None) => return Err("missing payload, pass --data or --data-file".to_string()),
    };
    serde_json::from_str(&raw).map_err(|e| format!("invalid JSON payload: {e}"))
}

async fn prompt_line(prompt: &str) -> Result<String, String> {
    print!("{prompt}");
    std::io::Write::flush(&mut std::io::stdout())
        .map_err(|e| format!("failed to flush stdout: {e}"))?;
    let mut line = String::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| format!("failed to read input: {e}"))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn confirm(question: &str) -> Result<bool, String> {
    let answer = prompt_line(&format!("{question} [y/N]: ")).await?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

async fn write_export_file(path: &str, rendered: &[u8]) -> Result<(), String> {
    let mut outfile = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| format!("failed to open output file: {e}"))?;
    outfile
        .write_all(rendered)
        .await
        .map_err(|_| "failed to write output file".to_string())?;
    Ok(())
}

#[derive(Clone, Debug)]
struct RunConfig {
    command: Command,
    api_url: String,
    token: Option<String>,
    timeout: u64,
    max_retries: u32,
    retry_backoff: bool,
    page_size: usize,
    no_color: bool,
    quiet: bool,
    config_path: Option<PathBuf>,
}

impl RunConfig {
    fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_attempts: self.max_retries,
            backoff: self.retry_backoff,
        }
    }
}

fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    config_path: Option<PathBuf>,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let quiet = args.quiet || cfg.quiet.unwrap_or(false);

    let api_url = args
        .api_url
        .or(cfg.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let token = args.token.or(cfg.token);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(DEFAULT_TIMEOUT);

    let max_retries = cfg.max_retries.unwrap_or(MAX_FETCH_ATTEMPTS).max(1);
    let retry_backoff = if args.no_retry_backoff {
        false
    } else {
        cfg.retry_backoff.unwrap_or(true)
    };

    let page_size = cfg.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    validation::check_page_size(page_size)?;

    Ok(RunConfig {
        command: args.command,
        api_url,
        token,
        timeout,
        max_retries,
        retry_backoff,
        page_size,
        no_color,
        quiet,
        config_path,
    })
}

async fn list_collection<T>(
    client: &ApiClient,
    run: &RunConfig,
    collection: Collection,
    args: &ListArgs,
    style: Option<(&'static str, CellStyle)>,
) -> Result<(), String>
where
    T: Queryable + Exportable + DeserializeOwned,
{
    let page_size = args.page_size.unwrap_or(run.page_size);
    let mut view = ListView::<T>::new(page_size).map_err(|e| e.to_string())?;

    let batch = fetch_collection::<T>(client, collection, run).await?;
    view.load(batch.records, batch.skipped);

    if let Some(term) = args.search.as_deref() {
        view.commit_search(term);
    }
    if let Some(raw) = args.sort.as_deref() {
        view.set_sort(validation::parse_sort(raw)?);
    }
    if args.discounted {
        view.toggle_filter(FilterFlag::Discounted);
    }
    if let Some(raw) = args.page.as_deref() {
        let request = match validation::parse_page(raw)? {
            PageArg::First => PageRequest::First,
            PageArg::Last => PageRequest::Last,
            PageArg::Number(page) => PageRequest::Jump(page),
        };
        view.navigate(request).map_err(|e| e.to_string())?;
    }

    print_view_page(&view, style);
    Ok(())
}

async fn cmd_list(client: &ApiClient, run: &RunConfig, args: &ListArgs) -> Result<(), String> {
    let collection = validation::parse_collection(&args.collection)?;
    match collection {
        Collection::Spas => list_collection::<Spa>(client, run, collection, args, None).await,
        Collection::Users => list_collection::<User>(client, run, collection, args, None).await,
        Collection::Bookings => {
            list_collection::<Booking>(
                client,
                run,
                collection,
                args,
                Some(("Status", booking_status_style)),
            )
            .await
        }
        Collection::Inquiries => {
            list_collection::<Inquiry>(client, run, collection, args, None).await
        }
    }
}

async fn export_collection<T>(
    client: &ApiClient,
    run: &RunConfig,
    collection: Collection,
    args: &ExportArgs,
) -> Result<(), String>
where
    T: Queryable + Exportable + Serialize + DeserializeOwned,
{
    let format = match args.format.as_deref() {
        Some(raw) => validation::parse_format(raw)?,
        None => args
            .output
            .as_deref()
            .and_then(export::infer_format_from_path)
            .unwrap_or(ExportFormat::Csv),
    };

    let mut view = ListView::<T>::new(run.page_size).map_err(|e| e.to_string())?;
    let batch = fetch_collection::<T>(client, collection, run).await?;
    view.load(batch.records, batch.skipped);

    if let Some(term) = args.search.as_deref() {
        view.commit_search(term);
    }
    if let Some(raw) = args.sort.as_deref() {
        view.set_sort(validation::parse_sort(raw)?);
    }
    if args.discounted {
        view.toggle_filter(FilterFlag::Discounted);
    }

    let records = view.view();
    let rendered = export::render(&records, format).map_err(|e| e.to_string())?;
    let outfile_path = args.output.clone().unwrap_or_else(|| {
        format!("{}.{}", collection.export_stem(), format.extension())
    });
    write_export_file(&outfile_path, &rendered).await?;

    format_kv_line("Exported", &format!("{} rows ({})", records.len(), format.label()));
    format_kv_line("Output", &outfile_path);
    Ok(())
}

async fn cmd_export(client: &ApiClient, run: &RunConfig, args: &ExportArgs) -> Result<(), String> {
    let collection = validation::parse_collection(&args.collection)?;
    match collection {
        Collection::Spas => export_collection::<Spa>(client, run, collection, args).await,
        Collection::Users => export_collection::<User>(client, run, collection, args).await,
        Collection::Bookings => export_collection::<Booking>(client, run, collection, args).await,
        Collection::Inquiries => export_collection::<Inquiry>(client, run, collection, args).await,
    }
}

async fn create_record<T>(
    client: &ApiClient,
    collection: Collection,
    payload: &serde_json::Value,
) -> Result<(), String>
where
    T: Queryable + DeserializeOwned,
{
    let record: T = client
        .create(collection, payload)
        .await
        .map_err(|e| e.to_string())?;
    format_kv_line(
        "Created",
        &format!("{} ({})", record.display_name(), record.id()),
    );
    Ok(())
}

async fn cmd_create(client: &ApiClient, args: &CreateArgs) -> Result<(), String> {
    let collection = validation::parse_collection(&args.collection)?;
    let payload = read_payload(args.data.as_deref(), args.data_file.as_deref()).await?;
    validation::validate_payload(collection, &payload, true)?;
    match collection {
        Collection::Spas => create_record::<Spa>(client, collection, &payload).await,
        Collection::Users => create_record::<User>(client, collection, &payload).await,
        Collection::Bookings => create_record::<Booking>(client, collection, &payload).await,
        Collection::Inquiries => create_record::<Inquiry>(client, collection, &payload).await,
    }
}

async fn update_record<T>(
    client: &ApiClient,
    collection: Collection,
    id: &str,
    payload: &serde_json::Value,
) -> Result<(), String>
where
    T: Queryable + DeserializeOwned,
{
    let record: T = client
        .update(collection, id, payload)
        .await
        .map_err(|e| e.to_string())?;
    format_kv_line(
        "Updated",
        &format!("{} ({})", record.display_name(), record.id()),
    );
    Ok(())
}

async fn cmd_update(client: &ApiClient, args: &UpdateArgs) -> Result<(), String> {
    let collection = validation::parse_collection(&args.collection)?;
    let payload = read_payload(args.data.as_deref(), args.data_file.as_deref()).await?;
    validation::validate_payload(collection, &payload, false)?;
    match collection {
        Collection::Spas => update_record::<Spa>(client, collection, &args.id, &payload).await,
        Collection::Users => update_record::<User>(client, collection, &args.id, &payload).await,
        Collection::Bookings => {
            update_record::<Booking>(client, collection, &args.id, &payload).await
        }
        Collection::Inquiries => {
            update_record::<Inquiry>(client, collection, &args.id, &payload).await
        }
    }
}

async fn cmd_set_status(client: &ApiClient, args: &SetStatusArgs) -> Result<(), String> {
    let status = validation::parse_status(&args.status)?;
    let payload = serde_json::json!({ "status": status.as_str() });
    let booking: Booking = client
        .update(Collection::Bookings, &args.id, &payload)
        .await
        .map_err(|e| e.to_string())?;
    format_kv_line(
        "Booking",
        &format!("{} ({})", booking.display_name(), booking.id),
    );
    let label = booking.status_label();
    format_kv_line(
        "Status",
        &label.color(booking.status_color()).to_string(),
    );
    Ok(())
}

async fn cmd_delete(client: &ApiClient, args: &DeleteArgs) -> Result<(), String> {
    let collection = validation::parse_collection(&args.collection)?;
    if !args.yes {
        let question = format!("Delete {} record '{}'?", collection, args.id);
        if !confirm(&question).await? {
            println!("aborted, nothing was deleted");
            return Ok(());
        }
    }
    client
        .delete(collection, &args.id)
        .await
        .map_err(|e| e.to_string())?;
    format_kv_line("Deleted", &args.id);
    Ok(())
}

async fn cmd_summary(client: &ApiClient, run: &RunConfig) -> Result<(), String> {
    let mut tasks = FuturesUnordered::new();
    for collection in Collection::ALL {
        tasks.push(client.collection_summary(collection, run.policy()));
    }

    let mut gathered: Vec<(Collection, Result<CollectionStats, crate::api::ApiError>)> = Vec::new();
    while let Some(result) = tasks.next().await {
        gathered.push(result);
    }
    gathered.sort_by_key(|(collection, _)| {
        Collection::ALL.iter().position(|c| c == collection)
    });

    for (collection, result) in gathered {
        match result {
            Ok(stats) => {
                let mut value = format!("{} records", stats.total);
                if let Some(discounted) = stats.discounted {
                    value.push_str(&format!(", {discounted} discounted"));
                }
                if let Some(pending) = stats.pending {
                    value.push_str(&format!(", {pending} pending"));
                }
                if stats.skipped > 0 {
                    value.push_str(&format!(", {} skipped", stats.skipped));
                }
                format_kv_line(collection.path(), &value);
            }
            Err(e) => format_kv_line(collection.path(), &format!("error: {e}")),
        }
    }
    Ok(())
}

async fn cmd_login(client: &ApiClient, run: &RunConfig, args: &LoginArgs) -> Result<(), String> {
    let password = match args.password.clone() {
        Some(password) => password,
        None => prompt_line("password: ").await?,
    };
    let token = client
        .login(args.login_id.trim(), &password)
        .await
        .map_err(|e| e.to_string())?;

    let path = run
        .config_path
        .clone()
        .ok_or_else(|| "could not resolve a config path to store the token".to_string())?;
    config::store_token(&path, &token)?;

    format_kv_line("Login", "ok");
    format_kv_line("Config", &path.display().to_string());
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
enum BrowseCommand {
    Next,
    Previous,
    First,
    Last,
    Jump(usize),
    Search(String),
    Sort(SortKey),
    ToggleDiscounted,
    PageSize(usize),
    Export {
        format: ExportFormat,
        path: Option<String>,
    },
    Delete(String),
    Refresh,
    Help,
    Quit,
}

fn parse_browse_command(line: &str) -> Result<Option<BrowseCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    // a leading slash is a search; a bare slash clears it
    if let Some(term) = line.strip_prefix('/') {
        return Ok(Some(BrowseCommand::Search(term.to_string())));
    }

    let mut parts = line.split_whitespace();
    let head = parts.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = parts.collect();

    let command = match head.as_str() {
        "n" | "next" => BrowseCommand::Next,
        "p" | "prev" | "previous" => BrowseCommand::Previous,
        "f" | "first" => BrowseCommand::First,
        "l" | "last" => BrowseCommand::Last,
        "g" | "go" => {
            let raw = rest
                .first()
                .ok_or_else(|| "usage: go <page>".to_string())?;
            let page = raw
                .parse::<usize>()
                .map_err(|_| format!("invalid page '{raw}'"))?;
            BrowseCommand::Jump(page)
        }
        "sort" => {
            let raw = rest
                .first()
                .ok_or_else(|| "usage: sort <name|price-asc|price-desc|discount-desc|none>".to_string())?;
            BrowseCommand::Sort(validation::parse_sort(raw)?)
        }
        "d" | "discounted" => BrowseCommand::ToggleDiscounted,
        "size" => {
            let raw = rest
                .first()
                .ok_or_else(|| "usage: size <10|25|50|100>".to_string())?;
            let size = raw
                .parse::<usize>()
                .map_err(|_| format!("invalid page size '{raw}'"))?;
            BrowseCommand::PageSize(size)
        }
        "e" | "export" => {
            let raw = rest
                .first()
                .ok_or_else(|| "usage: export <csv|table|json> [file]".to_string())?;
            let format = validation::parse_format(raw)?;
            let path = rest.get(1).map(|s| s.to_string());
            BrowseCommand::Export { format, path }
        }
        "x" | "delete" => {
            let id = rest
                .first()
                .ok_or_else(|| "usage: delete <id>".to_string())?;
            BrowseCommand::Delete(id.to_string())
        }
        "r" | "refresh" => BrowseCommand::Refresh,
        "h" | "help" | "?" => BrowseCommand::Help,
        "q" | "quit" | "exit" => BrowseCommand::Quit,
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };
    Ok(Some(command))
}

fn print_browse_help() {
    println!("  n/next, p/prev, f/first, l/last   move between pages");
    println!("  g <page>                          jump to a page");
    println!("  /<term>                           search (a bare / clears it)");
    println!("  sort <key>                        name, price-asc, price-desc, discount-desc, none");
    println!("  d/discounted                      toggle the discounted filter");
    println!("  size <n>                          rows per page (10, 25, 50, 100)");
    println!("  e/export <format> [file]          write the filtered view to a file");
    println!("  x/delete <id>                     delete a record (asks first)");
    println!("  r/refresh                         refetch from the server (ctrl-c cancels)");
    println!("  q/quit                            leave");
}

async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

async fn handle_browse_command<T>(
    client: &ApiClient,
    run: &RunConfig,
    collection: Collection,
    view: &mut ListView<T>,
    lines: &mut Lines<BufReader<Stdin>>,
    command: BrowseCommand,
    style: Option<(&'static str, CellStyle)>,
) -> Result<bool, String>
where
    T: Queryable + Exportable + Serialize + DeserializeOwned,
{
    match command {
        BrowseCommand::Quit => return Ok(true),
        BrowseCommand::Help => print_browse_help(),
        BrowseCommand::Next => {
            let _ = view.navigate(PageRequest::Next);
            print_view_page(view, style);
        }
        BrowseCommand::Previous => {
            let _ = view.navigate(PageRequest::Previous);
            print_view_page(view, style);
        }
        BrowseCommand::First => {
            let _ = view.navigate(PageRequest::First);
            print_view_page(view, style);
        }
        BrowseCommand::Last => {
            let _ = view.navigate(PageRequest::Last);
            print_view_page(view, style);
        }
        BrowseCommand::Jump(page) => match view.navigate(PageRequest::Jump(page)) {
            Ok(_) => print_view_page(view, style),
            Err(e) => println!("{}", e.to_string().red()),
        },
        BrowseCommand::Search(term) => {
            view.type_search(term, std::time::Instant::now());
        }
        BrowseCommand::Sort(key) => {
            view.set_sort(key);
            print_view_page(view, style);
        }
        BrowseCommand::ToggleDiscounted => {
            let enabled = view.toggle_filter(FilterFlag::Discounted);
            format_kv_line("Discounted", if enabled { "on" } else { "off" });
            print_view_page(view, style);
        }
        BrowseCommand::PageSize(size) => match view.set_page_size(size) {
            Ok(()) => print_view_page(view, style),
            Err(e) => println!("{}", e.to_string().red()),
        },
        BrowseCommand::Export { format, path } => {
            let records = view.view();
            let rendered = export::render(&records, format).map_err(|e| e.to_string())?;
            let outfile_path = path.unwrap_or_else(|| {
                format!("{}.{}", collection.export_stem(), format.extension())
            });
            write_export_file(&outfile_path, &rendered).await?;
            format_kv_line("Exported", &format!("{} rows ({})", records.len(), format.label()));
            format_kv_line("Output", &outfile_path);
        }
        BrowseCommand::Delete(id) => {
            if !view.store().contains(&id) {
                println!("{}", format!("no record with id '{id}' in this view").red());
            } else if !view.try_begin_action(&id) {
                println!(
                    "{}",
                    format!("an action for '{id}' is already running").red()
                );
            } else {
                print!("Delete {} record '{}'? [y/N]: ", collection, id);
                std::io::Write::flush(&mut std::io::stdout())
                    .map_err(|e| format!("failed to flush stdout: {e}"))?;
                let answer = lines
                    .next_line()
                    .await
                    .map_err(|e| format!("failed to read input: {e}"))?
                    .unwrap_or_default()
                    .trim()
                    .to_lowercase();
                if answer == "y" || answer == "yes" {
                    match client.delete(collection, &id).await {
                        Ok(()) => {
                            view.apply_delete(&id);
                            format_kv_line("Deleted", &id);
                            print_view_page(view, style);
                        }
                        Err(e) => println!("{}", e.to_string().red()),
                    }
                } else {
                    println!("aborted, nothing was deleted");
                }
                view.finish_action(&id);
            }
        }
        BrowseCommand::Refresh => {
            view.fetch_state = FetchState::Fetching { attempt: 1 };
            tokio::select! {
                result = fetch_collection::<T>(client, collection, run) => match result {
                    Ok(batch) => {
                        view.load(batch.records, batch.skipped);
                        view.fetch_state = FetchState::Succeeded;
                        print_view_page(view, style);
                    }
                    Err(message) => {
                        view.fetch_state = FetchState::Failed;
                        println!("{}", message.red());
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    view.fetch_state = FetchState::Idle;
                    println!("refresh cancelled");
                }
            }
        }
    }
    Ok(false)
}

async fn browse_collection<T>(
    client: &ApiClient,
    run: &RunConfig,
    collection: Collection,
    page_size: usize,
    style: Option<(&'static str, CellStyle)>,
) -> Result<(), String>
where
    T: Queryable + Exportable + Serialize + DeserializeOwned,
{
    let mut view = ListView::<T>::new(page_size).map_err(|e| e.to_string())?;
    let batch = fetch_collection::<T>(client, collection, run).await?;
    view.load(batch.records, batch.skipped);
    view.fetch_state = FetchState::Succeeded;
    print_view_page(&view, style);
    println!("type 'help' for commands, 'quit' to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let deadline = view.search_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| format!("failed to read input: {e}"))?;
                let Some(line) = line else { break };
                match parse_browse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(command)) => {
                        let done = handle_browse_command::<T>(
                            client, run, collection, &mut view, &mut lines, command, style,
                        )
                        .await?;
                        if done {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message.red()),
                }
            }
            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                if view.poll_search(std::time::Instant::now()) {
                    print_view_page(&view, style);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_browse(client: &ApiClient, run: &RunConfig, args: &BrowseArgs) -> Result<(), String> {
    let collection = validation::parse_collection(&args.collection)?;
    let page_size = args.page_size.unwrap_or(run.page_size);
    match collection {
        Collection::Spas => {
            browse_collection::<Spa>(client, run, collection, page_size, None).await
        }
        Collection::Users => {
            browse_collection::<User>(client, run, collection, page_size, None).await
        }
        Collection::Bookings => {
            browse_collection::<Booking>(
                client,
                run,
                collection,
                page_size,
                Some(("Status", booking_status_style)),
            )
            .await
        }
        Collection::Inquiries => {
            browse_collection::<Inquiry>(client, run, collection, page_size, None).await
        }
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    if !run.quiet {
        print_banner(run.no_color);
        format_kv_line("API", &run.api_url);
    }

    let session = Session::new(run.token.clone());
    if !matches!(run.command, Command::Login(_)) && !session.has_token() {
        return Err("not logged in, run the login command first".to_string());
    }
    let client =
        ApiClient::new(&run.api_url, session, run.timeout).map_err(|e| e.to_string())?;

    let started = Instant::now();
    match run.command.clone() {
        Command::List(args) => cmd_list(&client, &run, &args).await?,
        Command::Export(args) => cmd_export(&client, &run, &args).await?,
        Command::Browse(args) => cmd_browse(&client, &run, &args).await?,
        Command::Create(args) => cmd_create(&client, &args).await?,
        Command::Update(args) => cmd_update(&client, &args).await?,
        Command::SetStatus(args) => cmd_set_status(&client, &args).await?,
        Command::Delete(args) => cmd_delete(&client, &args).await?,
        Command::Summary => cmd_summary(&client, &run).await?,
        Command::Login(args) => cmd_login(&client, &run, &args).await?,
    }

    if !run.quiet {
        println!();
        println!(":: Completed :: took {}s ::", started.elapsed().as_secs());
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let config_path = match args.config.as_deref() {
        Some(path) => Some(config::expand_tilde(path)),
        None => config::default_config_path(),
    };
    let cfg = match (args.config.is_some(), config_path.as_ref()) {
        (true, Some(path)) => config::load_config(path, false)?,
        (false, Some(path)) => {
            config::ensure_default_config_file(path)?;
            config::load_config(path, true)?
        }
        (_, None) => ConfigFile::default(),
    };

    let run = build_run_config(args, cfg, config_path)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
