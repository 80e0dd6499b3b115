//! UnClutter - categorized Gmail from the command line
//!
//! Signs in through the browser, runs one command against the mailbox, and
//! signs out again. The session only lives for the duration of the process.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use unclutter_mail::{MailService, MessageListing, ServiceConfig};

mod callback;

#[derive(Parser)]
#[command(name = "unclutter")]
#[command(about = "Read, categorize and answer Gmail from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the signed-in address
    Me,

    /// List recent messages with their categories
    List {
        /// Gmail search query, e.g. "is:unread"
        #[arg(long)]
        query: Option<String>,

        #[arg(long, default_value_t = 50)]
        max: usize,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one message with its plain-text body
    Show { id: String },

    /// Send a new message
    Send {
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// Reply to a message in its thread
    Reply {
        id: String,

        #[arg(long)]
        body: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let (listener, port) = callback::bind_loopback()?;
    let config = ServiceConfig::load()
        .context("Failed to load configuration")?
        .with_redirect_uri(callback::redirect_uri(port));
    let service = MailService::from_config(&config)?;

    let token = sign_in(&service, listener)?;
    let result = run(&service, &token, cli.cmd);

    if let Err(e) = service.logout(Some(&token)) {
        warn!("Logout failed: {}", e);
    }
    result
}

/// Run the browser consent flow and return an `Authorization` header value
fn sign_in(service: &MailService, listener: std::net::TcpListener) -> Result<String> {
    let auth_url = service.login_url(None);

    println!("Opening browser for Google sign-in...");
    println!("If the browser doesn't open, visit: {}", auth_url);
    if let Err(e) = open::that(&auth_url) {
        warn!("Failed to open browser: {}", e);
    }

    let params = callback::wait_for_callback(listener)?;
    let id = service.complete_login(params)?;
    info!("Signed in");
    Ok(format!("Bearer {}", id.as_str()))
}

fn run(service: &MailService, token: &str, cmd: Command) -> Result<()> {
    let token = Some(token);

    match cmd {
        Command::Me => {
            println!("{}", service.current_user(token)?);
        }
        Command::List { query, max, json } => {
            let listing = service.list_messages(token, query.as_deref(), max)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&listing);
            }
        }
        Command::Show { id } => {
            let msg = service.get_message(token, &id)?;
            println!("From:    {}", msg.sender);
            println!("Subject: {}", msg.subject);
            println!("Date:    {}", msg.date_header);
            println!();
            println!("{}", msg.body);
        }
        Command::Send { to, subject, body } => {
            let sent = service.send(token, &to, &subject, &body)?;
            println!("Sent {}", sent.id.as_str());
        }
        Command::Reply { id, body } => {
            let sent = service.reply(token, &id, &body)?;
            println!("Replied with {}", sent.id.as_str());
        }
    }

    Ok(())
}

fn print_listing(listing: &MessageListing) {
    for msg in &listing.messages {
        println!(
            "{:<16} {:<11} {:<30.30} {}",
            msg.id.as_str(),
            msg.category.as_str(),
            msg.sender,
            msg.subject
        );
    }
    if listing.is_partial() {
        println!(
            "({} of {} messages could not be loaded)",
            listing.failed, listing.requested
        );
    }
}
