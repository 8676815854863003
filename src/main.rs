// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::env;
use std::path::Path;

use family_expenses::entities::category_icon;
use family_expenses::{
    export_expenses, format_colones, init_tracing, AppConfig, AppError, Category, ExpenseDraft,
    Registration, Session, UserOrigin,
};

const USAGE: &str = "\
Usage: family-expenses [--user <name|email>] [--password <pw>] <command>

Commands:
  register <username> <email> <password>
  login
  add <amount> <category> [fixed|variable] <description...>
  edit <n> <amount> <category> [fixed|variable] <description...>
  delete <n>
  list
  report
  users
  delete-user <username>
  delete-cloud-account
  dark-mode [on|off]
  export <file.csv>
  categories
  ui                       (default)

Credentials may also come from FAMILY_EXPENSES_USER / FAMILY_EXPENSES_PASSWORD.
Exit codes: 1 error, 2 invalid input, 3 not authorized.";

/// Command line split into the command, its arguments and credential flags.
#[derive(Debug, Default, PartialEq)]
struct Cli {
    command: Option<String>,
    args: Vec<String>,
    user: Option<String>,
    password: Option<String>,
}

fn parse_args<I: IntoIterator<Item = String>>(raw: I) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut raw = raw.into_iter();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--user" | "-u" => cli.user = Some(raw.next().context("--user needs a value")?),
            "--password" | "-p" => {
                cli.password = Some(raw.next().context("--password needs a value")?)
            }
            _ if arg.starts_with("--user=") => cli.user = Some(arg["--user=".len()..].to_string()),
            _ if arg.starts_with("--password=") => {
                cli.password = Some(arg["--password=".len()..].to_string())
            }
            _ if cli.command.is_none() => cli.command = Some(arg),
            _ => cli.args.push(arg),
        }
    }
    Ok(cli)
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = match parse_args(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    // keep the alternate screen clean
    let default_filter = match cli.command.as_deref() {
        None | Some("ui") => "family_expenses=warn",
        _ => "family_expenses=info",
    };
    init_tracing(default_filter);

    if let Err(e) = run(cli) {
        eprintln!("❌ {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<AppError>() {
        Some(app) if app.is_validation() => 2,
        Some(app) if app.is_authorization() => 3,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;
    let mut session = Session::from_config(&config)?;

    let command = cli.command.clone().unwrap_or_else(|| "ui".to_string());
    match command.as_str() {
        "register" => run_register(&mut session, &cli.args),
        "login" => {
            let username = login(&mut session, &cli)?;
            println!("✅ Logged in as {}", username);
            Ok(())
        }
        "add" => {
            login(&mut session, &cli)?;
            run_add(&mut session, &cli.args)
        }
        "edit" => {
            login(&mut session, &cli)?;
            run_edit(&mut session, &cli.args)
        }
        "delete" => {
            login(&mut session, &cli)?;
            run_delete(&mut session, &cli.args)
        }
        "list" => {
            login(&mut session, &cli)?;
            run_list(&session)
        }
        "report" => {
            if has_credentials(&cli) {
                login(&mut session, &cli)?;
            }
            run_report(&session);
            Ok(())
        }
        "users" => {
            run_users(&session);
            Ok(())
        }
        "delete-user" => {
            let username = cli.args.first().context("usage: delete-user <username>")?;
            session.delete_user(username)?;
            println!("🗑️  Deleted user {} and their expenses", username);
            Ok(())
        }
        "delete-cloud-account" => {
            login(&mut session, &cli)?;
            let uid = session
                .current_user()
                .and_then(|u| u.uid.clone())
                .ok_or(AppError::NotAccountOwner)?;
            session.delete_cloud_account(&uid)?;
            println!("🗑️  Cloud account deleted");
            Ok(())
        }
        "dark-mode" => run_dark_mode(&session, &cli.args),
        "export" => {
            login(&mut session, &cli)?;
            let path = cli.args.first().context("usage: export <file.csv>")?;
            let view = session.expenses()?;
            let rows = export_expenses(Path::new(path), &view.expenses)?;
            println!("📤 Exported {} expenses to {}", rows, path);
            Ok(())
        }
        "categories" => {
            for c in Category::ALL {
                println!("{} {:<16} ({})", c.icon(), c.as_str(), c.legacy_label());
            }
            Ok(())
        }
        "ui" => {
            if has_credentials(&cli) {
                login(&mut session, &cli)?;
            }
            run_ui_mode(session)
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command {:?}\n\n{}", other, USAGE),
    }
}

// ============================================================================
// CREDENTIALS
// ============================================================================

fn credential(flag: &Option<String>, var: &str) -> Option<String> {
    flag.clone()
        .or_else(|| env::var(var).ok())
        .filter(|v| !v.is_empty())
}

fn has_credentials(cli: &Cli) -> bool {
    credential(&cli.user, "FAMILY_EXPENSES_USER").is_some()
}

fn login(session: &mut Session, cli: &Cli) -> Result<String> {
    let user = credential(&cli.user, "FAMILY_EXPENSES_USER")
        .context("no user given (use --user or FAMILY_EXPENSES_USER)")?;
    let password = credential(&cli.password, "FAMILY_EXPENSES_PASSWORD")
        .context("no password given (use --password or FAMILY_EXPENSES_PASSWORD)")?;

    Ok(session.login(&user, &password)?)
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_register(session: &mut Session, args: &[String]) -> Result<()> {
    let [username, email, password] = args else {
        bail!("usage: register <username> <email> <password>");
    };

    match session.register(username, email, password)? {
        Registration::Local => println!("✅ Registered {}. You can log in now.", username),
        Registration::Cloud { .. } => {
            println!("✅ Registered {} in the cloud. Log in with {}.", username, email)
        }
    }
    Ok(())
}

/// 1-based position as shown by `list`, converted to an index.
fn parse_position(raw: Option<&String>) -> Result<usize> {
    let raw = raw.context("missing expense position")?;
    let n: usize = raw
        .parse()
        .with_context(|| format!("not a position: {:?}", raw))?;
    n.checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}

fn position_error(e: AppError) -> anyhow::Error {
    match e {
        AppError::NoSuchExpense(i) => anyhow!("no expense at position {}", i + 1),
        other => other.into(),
    }
}

fn run_add(session: &mut Session, args: &[String]) -> Result<()> {
    let expense = session.add_expense(&ExpenseDraft::from_words(args))?;
    println!(
        "✅ Added {} {} ₡{} ({})",
        expense.icon(),
        expense.category,
        format_colones(expense.amount),
        expense.description
    );
    Ok(())
}

fn run_edit(session: &mut Session, args: &[String]) -> Result<()> {
    let index = parse_position(args.first())?;
    let draft = ExpenseDraft::from_words(args.get(1..).unwrap_or_default());
    let expense = session.edit_expense(index, &draft).map_err(position_error)?;
    println!(
        "✏️  Updated #{}: {} {} ₡{} ({})",
        index + 1,
        expense.icon(),
        expense.category,
        format_colones(expense.amount),
        expense.description
    );
    Ok(())
}

fn run_delete(session: &mut Session, args: &[String]) -> Result<()> {
    let index = parse_position(args.first())?;
    let expense = session.delete_expense(index).map_err(position_error)?;
    println!("🗑️  Deleted #{}: {}", index + 1, expense.description);
    Ok(())
}

fn run_list(session: &Session) -> Result<()> {
    let view = session.expenses()?;

    println!("💰 Expenses for {}", view.username);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if view.expenses.is_empty() {
        println!("   (none yet)");
    }
    for (i, e) in view.expenses.iter().enumerate() {
        println!(
            "{:>3}. {}  {} {:<14} {:<9} ₡{:>12}  {}",
            i + 1,
            e.date.get(..10).unwrap_or(&e.date),
            e.icon(),
            e.category,
            e.kind.as_str(),
            format_colones(e.amount),
            e.description
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total: ₡{}", format_colones(view.total));
    Ok(())
}

fn run_report(session: &Session) {
    let report = session.report(Utc::now().date_naive());

    println!("📊 Family report");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.is_empty() {
        println!("   No expenses to report yet");
        return;
    }

    println!("\nBy category:");
    for c in &report.by_category {
        println!(
            "  {} {:<16} ₡{:>12}",
            category_icon(&c.category),
            c.category,
            format_colones(c.total)
        );
    }

    println!("\nLast {} months:", report.monthly.len());
    for (month, total) in report.monthly.months.iter().zip(&report.monthly.totals) {
        println!("  {}  ₡{:>12}", month, format_colones(*total));
    }

    let trend: Vec<String> = report.trend.totals.iter().map(|t| format_colones(*t)).collect();
    println!("\nTrend ({} months): {}", report.trend.len(), trend.join(" → "));

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Total: ₡{} across {} expenses from {} users",
        format_colones(report.total),
        report.expense_count,
        report.users.len()
    );
}

fn run_users(session: &Session) {
    let users = session.users();
    println!("👥 {} users", users.len());
    for u in users {
        let origin = match u.origin {
            UserOrigin::Local => "local".to_string(),
            UserOrigin::Cloud { uid } => format!("cloud {}", uid),
        };
        println!("  👤 {:<16} {:<28} {}", u.username, u.email, origin);
    }
}

fn run_dark_mode(session: &Session, args: &[String]) -> Result<()> {
    let enabled = match args.first().map(String::as_str) {
        None => session.toggle_dark_mode()?,
        Some("on") => {
            session.set_dark_mode(true)?;
            true
        }
        Some("off") => {
            session.set_dark_mode(false)?;
            false
        }
        Some(other) => bail!("usage: dark-mode [on|off], got {:?}", other),
    };
    println!("{} Dark mode {}", if enabled { "🌙" } else { "☀️" }, if enabled { "on" } else { "off" });
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(session: Session) -> Result<()> {
    let mut app = ui::App::new(session);
    ui::run_ui(&mut app)?;
    println!("✅ UI closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_session: Session) -> Result<()> {
    bail!("TUI mode not available; rebuild with --features tui")
}
