use anyhow::Context;
use clap::{Parser, Subcommand};
use diesel::prelude::*;
use diesel::SqliteConnection;
use terroir::accounts::{delete_user_cascade, find_user_by_email, set_admin};
use terroir::configuration::get_configuration;
use terroir::database::{establish_connection, run_migrations};
use terroir::models::User;
use terroir::telemetry::{get_subscriber, init_subscriber};

/// Maintenance tasks run directly against the marketplace database.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// SQLite file to operate on. Defaults to the configured database.
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every account with its linked producer.
    ListUsers,
    /// Delete an account, its producer profile and everything attached.
    DeleteUser {
        /// Numeric id or email address.
        user: String,
    },
    /// Give an account administrator rights.
    PromoteAdmin {
        /// Numeric id or email address.
        user: String,
    },
    /// Take administrator rights away from an account.
    DemoteAdmin {
        /// Numeric id or email address.
        user: String,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("terroir-admin".into(), "warn".into(), std::io::stderr);
    init_subscriber(subscriber)?;

    let args = Args::parse();
    let path = match args.database {
        Some(path) => path,
        None => get_configuration()
            .context("Failed to read configuration.")?
            .database
            .connection_string(),
    };
    let mut conn = establish_connection(&path)?;
    run_migrations(&mut conn)?;

    match args.command {
        Command::ListUsers => list_users(&mut conn),
        Command::DeleteUser { user } => delete_user(&mut conn, &user),
        Command::PromoteAdmin { user } => change_admin(&mut conn, &user, true),
        Command::DemoteAdmin { user } => change_admin(&mut conn, &user, false),
    }
}

/// Accepts either a numeric id or an email address.
fn resolve_user(conn: &mut SqliteConnection, user: &str) -> Result<Option<i32>, anyhow::Error> {
    match user.parse::<i32>() {
        Ok(id) => Ok(Some(id)),
        Err(_) => Ok(find_user_by_email(conn, &user.trim().to_lowercase())
            .context("Failed to look the user up.")?
            .map(|user| user.id)),
    }
}

fn list_users(conn: &mut SqliteConnection) -> Result<(), anyhow::Error> {
    use terroir::schema::{producteurs, utilisateurs};
    let rows: Vec<(User, Option<i32>, Option<String>)> = utilisateurs::table
        .left_join(producteurs::table.on(producteurs::user_id.eq(utilisateurs::id.nullable())))
        .order(utilisateurs::id.asc())
        .select((
            User::as_select(),
            producteurs::id.nullable(),
            producteurs::name.nullable(),
        ))
        .load(conn)
        .context("Failed to list users.")?;

    if rows.is_empty() {
        println!("No users.");
        return Ok(());
    }
    for (user, producer_id, producer_name) in rows {
        let producer = match (producer_id, producer_name) {
            (Some(id), Some(name)) => format!("{} (#{})", name, id),
            _ => "-".to_string(),
        };
        println!(
            "{}\t{}\t{}\t{}\t{}{}",
            user.id,
            user.email,
            user.phone.as_deref().unwrap_or("-"),
            user.created_at.format("%Y-%m-%d %H:%M"),
            producer,
            if user.is_admin { "\tadmin" } else { "" }
        );
    }
    Ok(())
}

fn delete_user(conn: &mut SqliteConnection, user: &str) -> Result<(), anyhow::Error> {
    let user_id = resolve_user(conn, user)?;
    let deleted = match user_id {
        Some(user_id) => delete_user_cascade(conn, user_id).context("Failed to delete the user.")?,
        None => None,
    };

    match deleted {
        Some(deleted) => {
            match deleted.producer_id {
                Some(producer_id) => println!(
                    "Deleted user {} and producer {}.",
                    deleted.user_id, producer_id
                ),
                None => println!("Deleted user {}.", deleted.user_id),
            }
            Ok(())
        }
        None => anyhow::bail!("No user matches '{}'.", user),
    }
}

fn change_admin(
    conn: &mut SqliteConnection,
    user: &str,
    is_admin: bool,
) -> Result<(), anyhow::Error> {
    let changed = match resolve_user(conn, user)? {
        Some(user_id) => set_admin(conn, user_id, is_admin)
            .context("Failed to update the user.")?
            .then_some(user_id),
        None => None,
    };
    match changed {
        Some(user_id) if is_admin => println!("User {} is now an administrator.", user_id),
        Some(user_id) => println!("User {} is no longer an administrator.", user_id),
        None => anyhow::bail!("No user matches '{}'.", user),
    }
    Ok(())
}
