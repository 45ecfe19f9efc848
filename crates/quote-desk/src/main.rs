//! Command-line front end for Quote Desk.
//!
//! Stands in for the wizards and both dashboards. Run two terminals against
//! the same database file to play the customer and the administrator:
//!
//! ```text
//! quote-desk submit --customer rajesh@example.com --category kitchen \
//!     --description "L-shaped kitchen" --budget 150000
//! quote-desk respond --request EST-000001 --amount 140000 \
//!     --timeline "30-45 days" --warranty "1 year" --description "Modular"
//! quote-desk say --request EST-000001 --as customer "Can you do 130000?"
//! quote-desk badge --as admin
//! quote-desk view --request EST-000001 --as admin
//! ```
//!
//! Every command prints JSON on stdout.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use durable_store::SqliteStore;
use negotiation::{
    ActorRole, Attachment, CustomerContact, NegotiationConfig, NegotiationCoordinator,
    NegotiationError, NewRequest, QuoteDraft, RequestFilter, RequestStatus, ServiceCategory,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB: &str = "quote-desk.db";

#[derive(Debug, Parser)]
#[command(name = "quote-desk")]
#[command(about = "Submit, quote and negotiate service requests")]
struct Args {
    /// SQLite database file. Falls back to QUOTE_DESK_DB env, then quote-desk.db
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Compare-and-swap attempts per write. Falls back to QUOTE_DESK_MAX_CAS_ATTEMPTS
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a new request (customer)
    Submit {
        #[arg(long)]
        customer: String,

        /// kitchen, wardrobe, full_home or property
        #[arg(long, value_parser = parse_category)]
        category: Option<ServiceCategory>,

        #[arg(long)]
        description: String,

        /// Budget in whole currency units
        #[arg(long)]
        budget: Option<u64>,

        /// Contact name
        #[arg(long)]
        name: Option<String>,

        /// Contact email
        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },

    /// Post or edit the quote for a request (administrator)
    Respond {
        #[arg(long)]
        request: String,

        #[arg(long)]
        amount: u64,

        #[arg(long)]
        timeline: String,

        #[arg(long)]
        warranty: String,

        #[arg(long)]
        description: String,

        /// Internal notes, never shown to the customer
        #[arg(long, default_value = "")]
        notes: String,

        /// Image attachment as NAME:MEDIA_TYPE:REFERENCE (repeatable, max 5)
        #[arg(long = "attachment", value_parser = parse_attachment)]
        attachments: Vec<Attachment>,
    },

    /// Send a chat message on a request
    Say {
        #[arg(long)]
        request: String,

        /// customer or admin
        #[arg(long = "as", value_parser = parse_role)]
        role: ActorRole,

        text: String,
    },

    /// Show a request's thread and mark it read
    View {
        #[arg(long)]
        request: String,

        #[arg(long = "as", value_parser = parse_role)]
        role: ActorRole,
    },

    /// Unread message count
    Badge {
        #[arg(long = "as", value_parser = parse_role)]
        role: ActorRole,

        /// Required for the customer role
        #[arg(long)]
        customer: Option<String>,
    },

    /// List requests
    List {
        /// pending or responded
        #[arg(long, value_parser = parse_status)]
        status: Option<RequestStatus>,

        #[arg(long)]
        customer: Option<String>,

        /// Matches id, category, description or customer name
        #[arg(long)]
        search: Option<String>,
    },

    /// Dashboard totals (administrator)
    Summary,

    /// Customers directory (administrator)
    Customers,

    /// Quotes received by a customer
    Quotes {
        #[arg(long)]
        customer: String,
    },
}

fn parse_category(value: &str) -> Result<ServiceCategory, String> {
    ServiceCategory::parse(value).ok_or_else(|| format!("unknown category: {}", value))
}

fn parse_role(value: &str) -> Result<ActorRole, String> {
    ActorRole::parse(value).ok_or_else(|| format!("unknown role: {} (customer or admin)", value))
}

fn parse_status(value: &str) -> Result<RequestStatus, String> {
    RequestStatus::parse(value).ok_or_else(|| format!("unknown status: {}", value))
}

fn parse_attachment(value: &str) -> Result<Attachment, String> {
    let mut parts = value.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(media_type), Some(reference))
            if !name.is_empty() && !media_type.is_empty() && !reference.is_empty() =>
        {
            Ok(Attachment::new(name, media_type, reference))
        }
        _ => Err(format!(
            "expected NAME:MEDIA_TYPE:REFERENCE, got {}",
            value
        )),
    }
}

/// Run a user-level action, re-running it once if it lost every CAS race.
fn with_retry<T>(action: impl Fn() -> negotiation::Result<T>) -> negotiation::Result<T> {
    match action() {
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "Write conflicted, retrying once");
            action()
        }
        other => other,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_corrupt(keys: &[String]) {
    for key in keys {
        warn!(key = %key, "Skipped unreadable record");
    }
}

#[derive(Serialize)]
struct Listing {
    requests: Vec<negotiation::Request>,
    corrupt: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let db = args
        .db
        .or_else(|| env::var("QUOTE_DESK_DB").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

    let mut config = NegotiationConfig::from_env();
    if let Some(attempts) = args.max_attempts {
        config = config.with_max_cas_attempts(attempts);
    }

    info!(db = %db.display(), max_attempts = config.max_cas_attempts, "Opening quote desk");
    let store = SqliteStore::open(&db)?;
    let desk = NegotiationCoordinator::with_config(Arc::new(store), config);

    match args.command {
        Command::Submit {
            customer,
            category,
            description,
            budget,
            name,
            email,
            phone,
            address,
        } => {
            let contact = (name.is_some() || email.is_some()).then(|| CustomerContact {
                name: name.unwrap_or_default(),
                email: email.unwrap_or_default(),
                phone,
                address,
            });
            let new = NewRequest {
                customer_id: customer,
                category,
                description,
                budget_estimate: budget,
                contact,
            };
            let id = with_retry(|| desk.submit_request(new.clone()))?;
            print_json(&serde_json::json!({ "id": id }))?;
        }

        Command::Respond {
            request,
            amount,
            timeline,
            warranty,
            description,
            notes,
            attachments,
        } => {
            let draft = QuoteDraft {
                quote_amount: amount,
                timeline_text: timeline,
                warranty_text: warranty,
                description,
                internal_notes: notes,
                attachments,
            };
            let response = with_retry(|| desk.post_response(&request, draft.clone()))?;
            print_json(&response)?;
        }

        Command::Say {
            request,
            role,
            text,
        } => {
            let appended = with_retry(|| desk.post_message(&request, role, &text))?;
            print_json(&appended)?;
        }

        Command::View { request, role } => {
            let thread = with_retry(|| desk.view_thread(&request, role))?;
            let response = desk.response_for(&request, role)?;
            print_json(&serde_json::json!({
                "request": desk.request(&request)?,
                "response": response,
                "messages": thread,
            }))?;
        }

        Command::Badge { role, customer } => {
            let report = match (role, customer) {
                (ActorRole::Administrator, _) => desk.administrator_badge()?,
                (ActorRole::Customer, Some(customer)) => desk.customer_badge(&customer)?,
                (ActorRole::Customer, None) => {
                    return Err("--customer is required for the customer badge".into())
                }
            };
            print_json(&report)?;
        }

        Command::List {
            status,
            customer,
            search,
        } => {
            let filter = RequestFilter {
                status,
                customer_id: customer,
                text: search,
            };

            let mut listing = Listing {
                requests: Vec::new(),
                corrupt: Vec::new(),
            };
            for item in desk.list_requests(filter)? {
                match item {
                    Ok(request) => listing.requests.push(request),
                    Err(NegotiationError::CorruptState { key, .. }) => listing.corrupt.push(key),
                    Err(err) => return Err(err.into()),
                }
            }
            print_json(&listing)?;
        }

        Command::Summary => print_json(&desk.summary()?)?,

        Command::Customers => {
            let directory = desk.customers()?;
            report_corrupt(&directory.corrupt);
            print_json(&directory)?;
        }

        Command::Quotes { customer } => {
            let quotes = desk.customer_quotes(&customer)?;
            report_corrupt(&quotes.corrupt);
            print_json(&quotes)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_attachment() {
        let attachment = parse_attachment("layout.png:image/png:https://cdn.example.com/a:b").unwrap();
        assert_eq!(attachment.name, "layout.png");
        assert_eq!(attachment.media_type, "image/png");
        assert_eq!(attachment.reference, "https://cdn.example.com/a:b");

        assert!(parse_attachment("layout.png").is_err());
        assert!(parse_attachment("layout.png::ref").is_err());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("admin"), Ok(ActorRole::Administrator));
        assert!(parse_role("system").is_err());
    }

    #[test]
    fn test_say_arguments() {
        let args = Args::try_parse_from([
            "quote-desk",
            "--db",
            "/tmp/desk.db",
            "say",
            "--request",
            "EST-000001",
            "--as",
            "customer",
            "Can you do 130000?",
        ])
        .unwrap();

        assert_eq!(args.db, Some(PathBuf::from("/tmp/desk.db")));
        match args.command {
            Command::Say {
                request,
                role,
                text,
            } => {
                assert_eq!(request, "EST-000001");
                assert_eq!(role, ActorRole::Customer);
                assert_eq!(text, "Can you do 130000?");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_with_retry_runs_once_more_on_conflict() {
        let calls = std::cell::Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(NegotiationError::Conflict {
                    key: "threads/EST-000001".to_string(),
                    attempts: 5,
                })
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 2);

        let calls = std::cell::Cell::new(0);
        let result: negotiation::Result<()> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(NegotiationError::NotFound {
                entity: "Request",
                id: "EST-000001".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
