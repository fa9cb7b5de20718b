use std::fs;
use std::path::PathBuf;
use std::process;

use asistencia::names::parse_nlp_list;
use asistencia::parser::{parse_form_result, prepare_form};
use asistencia::scraper::WebScraper;
use asistencia::types::{AttendanceQuery, AttendanceRecord};
use asistencia::utils::{AttendanceStats, DateWindow};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "asistencia")]
#[command(about = "A parliamentary attendance scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct WindowArgs {
    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        help = "Only query sessions from this date onwards",
        value_parser = parse_date,
    )]
    start_date: Option<NaiveDate>,

    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        help = "Only query sessions up to this date",
        value_parser = parse_date,
    )]
    end_date: Option<NaiveDate>,
}

impl WindowArgs {
    fn into_window(self) -> DateWindow {
        DateWindow {
            start_date: self.start_date,
            end_date: self.end_date,
        }
        .validate()
        .unwrap_or_else(|e| {
            log::error!("Invalid args: {e}");
            process::exit(1);
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the attendance index and every form it leads to
    Crawl {
        #[arg(help = "URL of the attendance index page")]
        index_url: String,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Parse a saved attendance result page
    Parse {
        #[arg(help = "Path to the saved result page")]
        file: PathBuf,

        #[arg(long, help = "URL the page was served from, used to resolve links")]
        url: String,

        #[arg(long, help = "Legislature identifier of the query")]
        legislature: String,

        #[arg(long, help = "Chamber identifier of the query")]
        chamber: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Preview the form submissions a saved query form page would produce
    Forms {
        #[arg(help = "Path to the saved form page")]
        file: PathBuf,

        #[arg(long, help = "URL the page was served from, used to resolve links")]
        url: String,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Split a Spanish list of names into individual people
    Names {
        #[arg(help = "Comma and 'y' separated list of names")]
        text: String,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())
}

fn read_page(file: &PathBuf) -> String {
    fs::read_to_string(file).unwrap_or_else(|e| {
        log::error!("Error reading {}: {}", file.display(), e);
        process::exit(1);
    })
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_records(records: &[AttendanceRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => serialize_json(&records),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No records to display.");
            } else {
                for (i, record) in records.iter().enumerate() {
                    println!("{:>4}. {}", i + 1, record);
                }
                print!("{}", AttendanceStats::from_records(records));
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Crawl {
            index_url,
            window,
            format,
        } => {
            let window = window.into_window();

            let scraper = WebScraper::new().unwrap_or_else(|e| {
                log::error!("Error creating scraper: {}", e);
                process::exit(1);
            });

            let records = scraper
                .crawl(&index_url, &window)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error crawling {}: {}", index_url, e);
                    process::exit(1);
                });

            print_records(&records, format);
        }

        Commands::Parse {
            file,
            url,
            legislature,
            chamber,
            format,
        } => {
            let html = read_page(&file);
            let query = AttendanceQuery {
                legislature,
                chamber,
            };

            let records = parse_form_result(&html, &url, &query).unwrap_or_else(|e| {
                log::error!("Error parsing {}: {}", file.display(), e);
                process::exit(1);
            });

            print_records(&records, format);
        }

        Commands::Forms {
            file,
            url,
            window,
            format,
        } => {
            let window = window.into_window();
            let html = read_page(&file);

            let requests = prepare_form(&html, &url, &window).unwrap_or_else(|e| {
                log::error!("Error parsing {}: {}", file.display(), e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&requests),
                OutputFormat::Text => {
                    if requests.is_empty() {
                        println!("No form requests within the date window.");
                    }
                    for request in &requests {
                        println!("{}", request);
                    }
                }
            }
        }

        Commands::Names { text } => {
            for name in parse_nlp_list(&text) {
                println!("{}", name);
            }
        }
    }
}
