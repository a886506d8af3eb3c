use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Card purchase sync and spending report service", long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = String::from(""), help = "The log directory e.g. '/var/logs'. If this is not provided, only logs out to stdout.")]
    pub base_log_dir: String,

    #[arg(
        long,
        env = "DATABASE_URL",
        default_value_t = String::from("sqlite://spendwatch.db"),
        help = "SQLite database URL e.g. 'sqlite:///var/lib/spendwatch/spendwatch.db'"
    )]
    pub database_url: String,

    #[arg(
        long,
        env = "CUSTOMER_ID",
        help = "Bank customer ID, sent with every API request"
    )]
    pub customer_id: String,

    #[arg(long, env = "CLIENT_ID", help = "Bank API client ID")]
    pub client_id: String,

    #[arg(long, env = "CLIENT_SECRET", help = "Bank API client secret")]
    pub client_secret: String,

    #[arg(
        long,
        default_value_t = String::from("https://api.sbanken.no"),
        help = "Base URL of the bank API"
    )]
    pub bank_api_url: String,

    #[arg(
        long,
        default_value_t = String::from("https://auth.sbanken.no/identityserver/connect/token"),
        help = "OAuth2 client-credentials token endpoint of the bank API"
    )]
    pub token_url: String,

    #[arg(long, default_value_t = 8000u32, help = "Port for the HTTP server")]
    pub port: u32,

    #[arg(
        long,
        default_value_t = 21600u64,
        help = "Interval in seconds between sync cycles"
    )]
    pub sync_interval: u64,

    #[arg(
        long,
        env = "NOTIFY_HOUR",
        value_parser = clap::value_parser!(u32).range(0..=23),
        help = "Local hour of day (0-23) at which the daily spending report is sent"
    )]
    pub notify_hour: u32,

    #[arg(
        long,
        env = "REPORT_CATEGORIES",
        value_delimiter = ',',
        help = "Ordered comma-separated list of categories broken out in the report"
    )]
    pub report_categories: Vec<String>,

    #[arg(long, env = "PUSHOVER_USER", help = "Pushover user key")]
    pub pushover_user: String,

    #[arg(long, env = "PUSHOVER_TOKEN", help = "Pushover application token")]
    pub pushover_token: String,
}

pub fn parse_args() -> Args {
    return Args::parse();
}
