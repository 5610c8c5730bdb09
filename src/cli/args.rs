use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "spadmin",
    version,
    about = "terminal admin client for a spa-booking platform",
    long_about = "Spadmin is a terminal admin client for a spa-booking platform, covering the spas, users, bookings and inquiries collections.\n\nExamples:\n  spadmin list bookings\n  spadmin list spas --search zen --sort price-asc --discounted\n  spadmin export bookings --format csv\n  spadmin browse spas\n  spadmin set-status 64a1f20c9b3e confirmed\n\nTip: Use --config to persist the API URL and token and keep CLI invocations short."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    #[arg(
        global = true,
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Connection",
        help = "Path to config file (defaults to ~/.spadmin/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        global = true,
        short = 'u',
        long = "au",
        visible_alias = "api-url",
        value_name = "URL",
        help_heading = "Connection",
        help = "API base URL (e.g. http://localhost:5000/api/v1)."
    )]
    pub api_url: Option<String>,

    #[arg(
        global = true,
        short = 'k',
        long = "tk",
        visible_alias = "token",
        value_name = "TOKEN",
        help_heading = "Connection",
        help = "Bearer token (overrides the one stored in the config)."
    )]
    pub token: Option<String>,

    #[arg(
        global = true,
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "Connection",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        global = true,
        long = "nr",
        visible_alias = "no-retry-backoff",
        help_heading = "Connection",
        help = "Retry failed fetches back-to-back instead of pausing between attempts."
    )]
    pub no_retry_backoff: bool,

    #[arg(
        global = true,
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        global = true,
        short = 'q',
        long = "qt",
        visible_alias = "quiet",
        help_heading = "Output",
        help = "Suppress the banner and progress output."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Print one page of a collection.")]
    List(ListArgs),

    #[command(about = "Write the full filtered view of a collection to a file.")]
    Export(ExportArgs),

    #[command(about = "Browse a collection interactively.")]
    Browse(BrowseArgs),

    #[command(about = "Create a record from a JSON payload.")]
    Create(CreateArgs),

    #[command(about = "Replace a record's fields from a JSON payload.")]
    Update(UpdateArgs),

    #[command(name = "set-status", about = "Set a booking's status.")]
    SetStatus(SetStatusArgs),

    #[command(about = "Delete a record by id.")]
    Delete(DeleteArgs),

    #[command(about = "Show record counts across all collections.")]
    Summary,

    #[command(about = "Log in and store the bearer token in the config file.")]
    Login(LoginArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(
        value_name = "COLLECTION",
        help = "Collection to list (spas, users, bookings, inquiries)."
    )]
    pub collection: String,

    #[arg(
        short = 's',
        long = "se",
        visible_alias = "search",
        value_name = "TERM",
        help_heading = "Query",
        help = "Keep records whose searchable fields contain TERM (case-insensitive) or whose id contains it exactly."
    )]
    pub search: Option<String>,

    #[arg(
        long = "so",
        visible_alias = "sort",
        value_name = "KEY",
        help_heading = "Query",
        help = "Sort key (name, price-asc, price-desc, discount-desc, none)."
    )]
    pub sort: Option<String>,

    #[arg(
        short = 'd',
        long = "dc",
        visible_alias = "discounted",
        help_heading = "Query",
        help = "Only records with an active discount."
    )]
    pub discounted: bool,

    #[arg(
        short = 'p',
        long = "pg",
        visible_alias = "page",
        value_name = "PAGE",
        help_heading = "Paging",
        help = "Page to show: a number, 'first' or 'last'."
    )]
    pub page: Option<String>,

    #[arg(
        short = 'P',
        long = "ps",
        visible_alias = "page-size",
        value_name = "N",
        help_heading = "Paging",
        help = "Rows per page (10, 25, 50 or 100)."
    )]
    pub page_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(
        value_name = "COLLECTION",
        help = "Collection to export (spas, users, bookings, inquiries)."
    )]
    pub collection: String,

    #[arg(
        short = 's',
        long = "se",
        visible_alias = "search",
        value_name = "TERM",
        help_heading = "Query",
        help = "Keep records whose searchable fields contain TERM (case-insensitive) or whose id contains it exactly."
    )]
    pub search: Option<String>,

    #[arg(
        long = "so",
        visible_alias = "sort",
        value_name = "KEY",
        help_heading = "Query",
        help = "Sort key (name, price-asc, price-desc, discount-desc, none)."
    )]
    pub sort: Option<String>,

    #[arg(
        short = 'd',
        long = "dc",
        visible_alias = "discounted",
        help_heading = "Query",
        help = "Only records with an active discount."
    )]
    pub discounted: bool,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Export format (csv, table, json)."
    )]
    pub format: Option<String>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Output file (defaults to <collection>_list.<ext> in the current directory)."
    )]
    pub output: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    #[arg(
        value_name = "COLLECTION",
        help = "Collection to browse (spas, users, bookings, inquiries)."
    )]
    pub collection: String,

    #[arg(
        short = 'P',
        long = "ps",
        visible_alias = "page-size",
        value_name = "N",
        help_heading = "Paging",
        help = "Rows per page (10, 25, 50 or 100)."
    )]
    pub page_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(
        value_name = "COLLECTION",
        help = "Collection to create the record in (spas, users, bookings, inquiries)."
    )]
    pub collection: String,

    #[arg(
        short = 'D',
        long = "dt",
        visible_alias = "data",
        value_name = "JSON",
        help_heading = "Payload",
        help = "Record fields as a JSON object."
    )]
    pub data: Option<String>,

    #[arg(
        short = 'f',
        long = "df",
        visible_alias = "data-file",
        value_name = "FILE",
        conflicts_with = "data",
        help_heading = "Payload",
        help = "Read the record fields from a JSON file."
    )]
    pub data_file: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(
        value_name = "COLLECTION",
        help = "Collection the record lives in (spas, users, bookings, inquiries)."
    )]
    pub collection: String,

    #[arg(value_name = "ID", help = "Record id.")]
    pub id: String,

    #[arg(
        short = 'D',
        long = "dt",
        visible_alias = "data",
        value_name = "JSON",
        help_heading = "Payload",
        help = "Fields to change as a JSON object."
    )]
    pub data: Option<String>,

    #[arg(
        short = 'f',
        long = "df",
        visible_alias = "data-file",
        value_name = "FILE",
        conflicts_with = "data",
        help_heading = "Payload",
        help = "Read the fields to change from a JSON file."
    )]
    pub data_file: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SetStatusArgs {
    #[arg(value_name = "ID", help = "Booking id.")]
    pub id: String,

    #[arg(
        value_name = "STATUS",
        help = "New status (pending, confirmed, completed, cancelled)."
    )]
    pub status: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(
        value_name = "COLLECTION",
        help = "Collection the record lives in (spas, users, bookings, inquiries)."
    )]
    pub collection: String,

    #[arg(value_name = "ID", help = "Record id.")]
    pub id: String,

    #[arg(
        short = 'y',
        long = "yes",
        help_heading = "Prompt",
        help = "Skip the confirmation prompt."
    )]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(
        value_name = "LOGIN_ID",
        help = "Admin email address or 10-digit phone number."
    )]
    pub login_id: String,

    #[arg(
        value_name = "PASSWORD",
        help = "Password. Omit it to be prompted on stdin."
    )]
    pub password: Option<String>,
}
