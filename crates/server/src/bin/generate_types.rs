use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `crates/server/src/bin/generate_types.rs`.\n\n// Do not edit this file manually.";

    let decls: Vec<String> = vec![
        utils_core::response::ApiResponse::<()>::decl(),
        config::ServerConfig::decl(),
        config::DatabaseConfig::decl(),
        config::Config::decl(),
        db::models::user::User::decl(),
        db::models::user::CreateUser::decl(),
        db::models::user::UpdateUser::decl(),
        db::models::profile::Profile::decl(),
        db::models::profile::ProfileWithStats::decl(),
        db::models::profile::CreateProfile::decl(),
        db::models::profile::UpdateProfile::decl(),
        db::models::category::Category::decl(),
        db::models::category::CreateCategory::decl(),
        db::models::category::UpdateCategory::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::PartitionKey::decl(),
        db::models::task::Task::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::task::TaskSortUpdate::decl(),
        db::models::task::BulkReorder::decl(),
        db::models::task::ReorderOutcome::decl(),
        db::models::task::TaskStats::decl(),
        db::models::task::TaskFilters::decl(),
        db::models::task::TaskSortField::decl(),
        db::models::task::SortDirection::decl(),
        server::routes::tasks::UpdateTaskStatus::decl(),
        server::routes::tasks::SearchTasksRequest::decl(),
        server::routes::tasks::SearchTasksResponse::decl(),
        server::routes::health::HealthStatus::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n\n{body}\n")
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let check_mode = args.iter().any(|arg| arg == "--check");

    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            std::process::exit(0);
        } else {
            eprintln!("❌ shared/types.ts is not up to date. Please run 'cargo run --bin generate_types' and commit the changes.");
            std::process::exit(1);
        }
    }

    println!("Generating TypeScript types…");
    if let Err(e) = fs::create_dir_all(&shared_path) {
        eprintln!("Failed to create {}: {e}", shared_path.display());
        std::process::exit(1);
    }
    if let Err(e) = fs::write(&types_path, generated) {
        eprintln!("Failed to write {}: {e}", types_path.display());
        std::process::exit(1);
    }
    println!("✅ TypeScript types generated in {}", types_path.display());
}
