use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use expense_client::config::ClientConfig;
use expense_client::models::{ExpenseDraft, LoginRequest, RegisterRequest};
use expense_client::stats::build_summary;
use expense_client::transport::Transport;
use expense_client::ui::{render_expenses, render_notices, render_summary};
use expense_client::{ExpenseTracker, TrackerError};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "expense_client")]
#[command(about = "Track personal expenses against the expense tracker API", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "EXPENSE_TRACKER_PASSWORD")]
        password: String,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "EXPENSE_TRACKER_PASSWORD")]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show all expenses with a spending summary
    List,
    /// Record a new expense
    Add {
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Change an existing expense; omitted fields keep their value
    Edit {
        id: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete an expense, with a short window to undo
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let cli = Cli::parse();
    let mut tracker = cli.config.build_tracker().await;

    let ok = run(&mut tracker, cli.command).await?;

    eprint!(
        "{}",
        render_notices(
            tracker.notices().error_message().await.as_deref(),
            None,
        )
    );

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run<T: Transport>(
    tracker: &mut ExpenseTracker<T>,
    command: Commands,
) -> Result<bool, Box<dyn std::error::Error>> {
    let needs_session = !matches!(
        command,
        Commands::Register { .. } | Commands::Login { .. } | Commands::Logout
    );
    if needs_session && !tracker.is_signed_in() {
        eprintln!("not signed in; run `expense_client login` first");
        return Ok(false);
    }

    match command {
        Commands::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            let request = RegisterRequest {
                first_name,
                last_name,
                email,
                password,
            };
            if let Err(err) = tracker.register(&request).await {
                report_store_failure(&err);
                return Ok(false);
            }
            println!("Registered and signed in.");
        }
        Commands::Login { email, password } => {
            if let Err(err) = tracker.login(&LoginRequest { email, password }).await {
                report_store_failure(&err);
                return Ok(false);
            }
            println!("Signed in. {} expenses on record.", tracker.expenses().len());
        }
        Commands::Logout => {
            tracker.logout().await;
            println!("Signed out.");
        }
        Commands::List => {
            if tracker.fetch_expenses().await.is_err() {
                return Ok(false);
            }
            print!("{}", render_expenses(tracker.expenses()));
            println!();
            print!("{}", render_summary(&build_summary(tracker.expenses())));
        }
        Commands::Add {
            description,
            amount,
            category,
            date,
        } => {
            let draft = ExpenseDraft {
                description,
                amount,
                date: date.unwrap_or_else(|| Local::now().date_naive()),
                category,
            };
            if tracker.save_expense(None, &draft).await.is_err() {
                return Ok(false);
            }
            print_toast(tracker).await;
        }
        Commands::Edit {
            id,
            description,
            amount,
            category,
            date,
        } => {
            if tracker.fetch_expenses().await.is_err() {
                return Ok(false);
            }
            let Some(current) = tracker.expense(id) else {
                eprintln!("no expense with id {id}");
                return Ok(false);
            };
            let mut draft = current.to_draft();
            if let Some(description) = description {
                draft.description = description;
            }
            if let Some(amount) = amount {
                draft.amount = amount;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            if let Some(date) = date {
                draft.date = date;
            }
            if tracker.save_expense(Some(id), &draft).await.is_err() {
                return Ok(false);
            }
            print_toast(tracker).await;
        }
        Commands::Delete { id } => return delete_with_undo(tracker, id).await,
    }

    Ok(true)
}

async fn delete_with_undo<T: Transport>(
    tracker: &mut ExpenseTracker<T>,
    id: i64,
) -> Result<bool, Box<dyn std::error::Error>> {
    if tracker.fetch_expenses().await.is_err() {
        return Ok(false);
    }
    match tracker.delete_expense(id).await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("no expense with id {id}");
            return Ok(false);
        }
        Err(_) => return Ok(false),
    }
    print_toast(tracker).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    while tracker.can_undo().await {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().eq_ignore_ascii_case("u") => {
                    return Ok(tracker.undo_delete().await.is_ok_and(|restored| {
                        if restored {
                            println!("Expense restored.");
                        }
                        true
                    }));
                }
                Some(_) => continue,
                None => break,
            },
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
            _ = &mut ctrl_c => {
                warn!("interrupted; keeping the deletion");
                break;
            }
        }
    }

    info!("expense {id} deleted");
    Ok(true)
}

fn report_store_failure(err: &TrackerError) {
    if let TrackerError::Store(err) = err {
        eprintln!("the server accepted the credentials, but the session could not be saved, so you are not signed in: {err}");
    }
}

async fn print_toast<T: Transport>(tracker: &ExpenseTracker<T>) {
    let toast = tracker.notices().current_toast().await;
    print!("{}", render_notices(None, toast.as_ref()));
}
