//! Registrar
//!
//! Operator CLI for the tenant-isolated enrollment engine, backed by SQLite.

mod config;
mod seed;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use registrar_enrollment::{
    AdminEnrollRequest, AdminRemoveRequest, DropRequest, EnrollRequest, EnrollmentEngine,
    EnrollmentResult, FanoutAuditSink, OverrideOutcome, TracingAuditSink,
};
use registrar_persistence::backends::sqlite::SqliteBackend;
use registrar_persistence::{AuditSink, InstitutionId, RecordStorage};
use serde::Serialize;
use tracing::info;

use crate::config::{Command, RegistrarConfig};
use crate::seed::SeedDocument;

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence over
/// `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "registrar={level},registrar_enrollment={level},registrar_persistence={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Opens the SQLite database named by the configuration and makes sure the
/// schema exists.
fn create_sqlite_backend(config: &RegistrarConfig) -> anyhow::Result<SqliteBackend> {
    info!(database = %config.database_url, pool_size = config.pool_size, "Opening SQLite backend");

    let backend = SqliteBackend::with_config(&config.database_url, config.backend_config())?;
    backend.init_schema()?;

    Ok(backend)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = RegistrarConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let backend = Arc::new(create_sqlite_backend(&config)?);
    let audit = Arc::new(FanoutAuditSink::new(vec![
        Arc::clone(&backend) as Arc<dyn AuditSink>,
        Arc::new(TracingAuditSink),
    ]));
    let engine = EnrollmentEngine::new(Arc::clone(&backend), audit, config.engine_config());

    run(config.command, &engine).await
}

async fn run(command: Command, engine: &EnrollmentEngine<SqliteBackend>) -> anyhow::Result<ExitCode> {
    match command {
        Command::Init { seed } => {
            if let Some(path) = seed {
                let summary = SeedDocument::from_path(&path)?.load(engine.store().as_ref()).await?;
                print_json(&serde_json::json!({
                    "institutions": summary.institutions,
                    "memberships": summary.memberships,
                    "students": summary.students,
                    "courses": summary.courses,
                }))?;
            }
            info!("Schema ready");
            Ok(ExitCode::SUCCESS)
        }
        Command::Enroll {
            principal,
            institution,
            course,
            semester,
            year,
            correlation_id,
        } => {
            let mut request = EnrollRequest::new(principal, institution, course, semester, year);
            request.correlation_id = correlation_id;
            report(engine.enroll(&request).await)
        }
        Command::Drop {
            principal,
            institution,
            course,
            semester,
            correlation_id,
        } => {
            let mut request = DropRequest::new(principal, institution, course);
            request.semester = semester;
            request.correlation_id = correlation_id;
            report(engine.drop_enrollment(&request).await)
        }
        Command::AdminEnroll {
            admin,
            institution,
            student,
            course,
            semester,
            year,
            correlation_id,
        } => {
            let mut request =
                AdminEnrollRequest::new(admin, institution, student, course, semester, year);
            request.correlation_id = correlation_id;
            report(engine.admin_enroll(&request).await.map(override_json))
        }
        Command::AdminRemove {
            admin,
            institution,
            student,
            course,
            semester,
            correlation_id,
        } => {
            let mut request = AdminRemoveRequest::new(admin, institution, student, course);
            request.semester = semester;
            request.correlation_id = correlation_id;
            report(engine.admin_remove(&request).await.map(override_json))
        }
        Command::Roster {
            institution,
            course,
        } => {
            let rows = engine
                .store()
                .enrollments_for_course(&InstitutionId::new(institution), &course)
                .await?;
            print_json(&rows)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn override_json(outcome: OverrideOutcome) -> serde_json::Value {
    serde_json::json!({
        "enrollment": outcome.enrollment,
        "was_over_capacity": outcome.was_over_capacity,
    })
}

/// Prints the result document. Engine rejections are reported on stdout as
/// their outcome document and exit with status 2.
fn report<T: Serialize>(result: EnrollmentResult<T>) -> anyhow::Result<ExitCode> {
    match result {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            print_json(&error.outcome())?;
            Ok(ExitCode::from(2))
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
