//! # rollcall
//!
//! Binary entry point: runs the attendance coordinator and a small set of
//! admin commands over the same database.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::logging::init_subscriber;
use rollcall_core::{ClassId, Identity, Role, UserId};
use rollcall_server::{RollcallServer, ServerConfig, TokenAuthority};
use rollcall_settings::RollcallSettings;
use rollcall_store::{AttendanceRepo, ClassRepo, Database, SqliteDirectory, UserRepo};
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rollcall", about = "Live attendance session coordinator")]
struct Cli {
    /// Settings file (default: ~/.rollcall/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Database file, overriding `storage.dbPath`.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the coordinator until Ctrl-C.
    Serve {
        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage classes and rosters.
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },
    /// Issue a handshake token for an existing user.
    Token {
        /// User to issue for.
        #[arg(long)]
        user: UserId,
    },
    /// Inspect stored attendance.
    Attendance {
        #[command(subcommand)]
        action: AttendanceAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Register a user.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// `teacher` or `student`.
        #[arg(long)]
        role: Role,
    },
    /// List users, optionally of one role.
    List {
        #[arg(long)]
        role: Option<Role>,
    },
}

#[derive(Subcommand, Debug)]
enum ClassAction {
    /// Create a class owned by a teacher.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        teacher: UserId,
    },
    /// Append a student to a class roster.
    Enroll {
        #[arg(long)]
        class: ClassId,
        #[arg(long)]
        student: UserId,
    },
    /// Print a class and its roster.
    Show {
        #[arg(long)]
        class: ClassId,
    },
}

#[derive(Subcommand, Debug)]
enum AttendanceAction {
    /// Most recent record for a class, or one student's status in it.
    Latest {
        #[arg(long)]
        class: ClassId,
        #[arg(long)]
        student: Option<UserId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    match cli.command {
        Command::Serve { host, port } => serve(settings, host, port).await,
        command => {
            let db = Database::open(&settings.storage.db_path)
                .with_context(|| format!("Failed to open {}", settings.storage.db_path.display()))?;
            let output = run_admin(command, &db, &settings)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn load_settings(cli: &Cli) -> Result<RollcallSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(rollcall_settings::settings_path);
    let mut settings = rollcall_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(ref db_path) = cli.db_path {
        settings.storage.db_path.clone_from(db_path);
    }
    Ok(settings)
}

async fn serve(settings: RollcallSettings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::from(&settings.server);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    if settings.auth.uses_dev_secret() {
        warn!("using the built-in development JWT secret; set ROLLCALL_JWT_SECRET before exposing this server");
    }

    let db = Database::open(&settings.storage.db_path).context("Failed to open database")?;
    let server = RollcallServer::new(
        config,
        Arc::new(SqliteDirectory::new(db)),
        TokenAuthority::from_settings(&settings.auth),
    );

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!("rollcall listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Shutting down...");
    if server.stop(handle, None).await {
        info!("Shutdown complete");
    }
    Ok(())
}

fn run_admin(command: Command, db: &Database, settings: &RollcallSettings) -> Result<Value> {
    let output = match command {
        Command::Serve { .. } => anyhow::bail!("serve is not an admin command"),
        Command::User { action } => {
            let users = UserRepo::new(db.clone());
            match action {
                UserAction::Add { name, email, role } => {
                    serde_json::to_value(users.create(&name, &email, role)?)?
                }
                UserAction::List { role } => {
                    let roles = role.map_or_else(|| vec![Role::Teacher, Role::Student], |r| vec![r]);
                    let mut all = Vec::new();
                    for role in roles {
                        all.extend(users.list_by_role(role)?);
                    }
                    serde_json::to_value(all)?
                }
            }
        }
        Command::Class { action } => {
            let classes = ClassRepo::new(db.clone());
            let roster = match action {
                ClassAction::Create { name, teacher } => classes.create(&name, &teacher)?,
                ClassAction::Enroll { class, student } => classes.add_student(&class, &student)?,
                ClassAction::Show { class } => classes.get(&class)?,
            };
            serde_json::to_value(roster)?
        }
        Command::Token { user } => {
            let record = UserRepo::new(db.clone())
                .get(&user)
                .with_context(|| format!("No such user {user}"))?;
            if settings.auth.uses_dev_secret() {
                warn!("token signed with the built-in development secret");
            }
            let token = TokenAuthority::from_settings(&settings.auth)
                .issue(&Identity::new(record.id.clone(), record.role))?;
            json!({ "userId": record.id, "role": record.role, "token": token })
        }
        Command::Attendance {
            action: AttendanceAction::Latest { class, student },
        } => {
            let attendance = AttendanceRepo::new(db.clone());
            match student {
                Some(student) => json!({
                    "classId": class,
                    "studentId": student,
                    "status": attendance.latest_status_for_student(&class, &student)?,
                }),
                None => serde_json::to_value(attendance.latest_for_class(&class)?)?,
            }
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use rollcall_core::{AttendanceEntry, AttendanceStatus, NewAttendanceRecord};

    use super::*;

    fn settings() -> RollcallSettings {
        let mut s = RollcallSettings::default();
        s.auth.jwt_secret = "cli-test-secret".into();
        s
    }

    fn admin(db: &Database, args: &[&str]) -> Result<Value> {
        let cli = Cli::try_parse_from(std::iter::once("rollcall").chain(args.iter().copied()))?;
        run_admin(cli.command, db, &settings())
    }

    fn id_of(v: &Value, key: &str) -> String {
        v[key].as_str().unwrap().to_string()
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["rollcall", "serve"]);
        match cli.command {
            Command::Serve { host, port } => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(cli.settings.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "rollcall", "serve", "--port", "9090", "--db-path", "/tmp/x.db", "--settings", "/tmp/s.json",
        ]);
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Command::Serve { port: Some(9090), .. }));
    }

    #[test]
    fn bad_role_rejected_by_parser() {
        let err = Cli::try_parse_from([
            "rollcall", "user", "add", "--name", "A", "--email", "a@x", "--role", "admin",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn db_path_flag_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "rollcall".to_string(),
            "--settings".into(),
            dir.path().join("missing.json").display().to_string(),
            "--db-path".into(),
            dir.path().join("custom.db").display().to_string(),
            "user".into(),
            "list".into(),
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.storage.db_path, dir.path().join("custom.db"));
    }

    #[test]
    fn build_a_class_from_the_command_line() {
        let db = Database::in_memory().unwrap();
        let teacher = admin(&db, &["user", "add", "--name", "T", "--email", "t@x", "--role", "teacher"]).unwrap();
        let student = admin(&db, &["user", "add", "--name", "S", "--email", "s@x", "--role", "student"]).unwrap();
        let class = admin(&db, &["class", "create", "--name", "Math", "--teacher", &id_of(&teacher, "id")]).unwrap();
        let class_id = id_of(&class, "classId");

        let roster = admin(&db, &["class", "enroll", "--class", &class_id, "--student", &id_of(&student, "id")]).unwrap();
        assert_eq!(roster["studentIds"].as_array().unwrap().len(), 1);

        let shown = admin(&db, &["class", "show", "--class", &class_id]).unwrap();
        assert_eq!(shown, roster);

        let all = admin(&db, &["user", "list"]).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);
        let students = admin(&db, &["user", "list", "--role", "student"]).unwrap();
        assert_eq!(students.as_array().unwrap().len(), 1);
    }

    #[test]
    fn token_round_trips_through_authority() {
        let db = Database::in_memory().unwrap();
        let teacher = admin(&db, &["user", "add", "--name", "T", "--email", "t@x", "--role", "teacher"]).unwrap();
        let out = admin(&db, &["token", "--user", &id_of(&teacher, "id")]).unwrap();

        let identity = TokenAuthority::from_settings(&settings().auth)
            .verify(out["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(identity.id.as_str(), id_of(&teacher, "id"));
        assert_eq!(identity.role, Role::Teacher);
    }

    #[test]
    fn token_for_unknown_user_fails() {
        let db = Database::in_memory().unwrap();
        assert!(admin(&db, &["token", "--user", "usr_nobody"]).is_err());
    }

    #[test]
    fn latest_attendance_views() {
        let db = Database::in_memory().unwrap();
        let teacher = admin(&db, &["user", "add", "--name", "T", "--email", "t@x", "--role", "teacher"]).unwrap();
        let student = admin(&db, &["user", "add", "--name", "S", "--email", "s@x", "--role", "student"]).unwrap();
        let class = admin(&db, &["class", "create", "--name", "Math", "--teacher", &id_of(&teacher, "id")]).unwrap();
        let class_id = id_of(&class, "classId");
        let student_id = id_of(&student, "id");

        let none = admin(&db, &["attendance", "latest", "--class", &class_id]).unwrap();
        assert!(none.is_null());

        let _ = admin(&db, &["class", "enroll", "--class", &class_id, "--student", &student_id]).unwrap();
        let _ = AttendanceRepo::new(db.clone())
            .create(NewAttendanceRecord {
                class_id: ClassId::from_raw(class_id.as_str()),
                date: chrono::Utc::now(),
                records: vec![AttendanceEntry {
                    student_id: UserId::from_raw(student_id.as_str()),
                    status: AttendanceStatus::Present,
                }],
            })
            .unwrap();

        let latest = admin(&db, &["attendance", "latest", "--class", &class_id]).unwrap();
        assert_eq!(latest["records"].as_array().unwrap().len(), 1);

        let mine = admin(&db, &["attendance", "latest", "--class", &class_id, "--student", &student_id]).unwrap();
        assert_eq!(mine["status"], "present");
    }
}
