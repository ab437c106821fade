// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::rt::System;
use actix_web::{App, HttpServer, middleware::Logger, web};
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use nopgraph::app_state::AppState;
use nopgraph::config::{Config, ValidatedConfig};
use nopgraph::content::{ContentRepository, MemoryRepository};
use nopgraph::headers::Headers;
use nopgraph::iam::{PrincipalStore, SessionAuthMiddlewareFactory, YamlPrincipalStore};
use nopgraph::public;
use nopgraph::runtime_paths::RuntimePaths;

const ACCESS_LOG_FORMAT: &str = r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let parsed_args = match parse_args() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("❌ Invalid command line arguments: {}", error);
            eprintln!("❌ Use -C <root> to set the runtime directory.");
            return 1;
        }
    };

    if matches!(parsed_args.mode, RunMode::Help) {
        print!("{}", help_text());
        return 0;
    }

    let validated_config = match Config::load_and_validate(&parsed_args.runtime_root) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("❌ Configuration error: {}", error);
            eprintln!("❌ Application cannot start with invalid configuration.");
            return 1;
        }
    };

    let runtime_paths = match RuntimePaths::from_root(&parsed_args.runtime_root) {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("❌ Runtime directory error: {}", error);
            return 1;
        }
    };

    init_logging(&validated_config);
    log_startup_info(&validated_config, &runtime_paths);

    match System::new().block_on(run_server(validated_config, runtime_paths)) {
        Ok(()) => 0,
        Err(error) => {
            log::error!("Server terminated: {}", error);
            eprintln!("❌ Server error: {}", error);
            1
        }
    }
}

fn init_logging(config: &ValidatedConfig) {
    env_logger::Builder::from_default_env()
        .filter_level(config.log_level_filter())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

async fn run_server(
    validated_config: ValidatedConfig,
    runtime_paths: RuntimePaths,
) -> std::io::Result<()> {
    let repository: Arc<dyn ContentRepository> = Arc::new(
        MemoryRepository::load(&runtime_paths.content_file, &runtime_paths.content_dir)
            .map_err(|e| std::io::Error::other(e.to_string()))?,
    );
    info!("✅ Content repository loaded");

    let principals: Arc<dyn PrincipalStore> = Arc::new(
        YamlPrincipalStore::load(runtime_paths.users_file.clone())
            .map_err(|e| std::io::Error::other(e.to_string()))?,
    );
    info!("✅ Principal store loaded");

    let app_state = Arc::new(AppState::new(&validated_config, repository, principals));
    info!(
        "✅ Render pipeline ready ({} mode, {} worker(s))",
        if validated_config.rendering.async_enabled {
            "streaming"
        } else {
            "buffered"
        },
        validated_config.rendering.render_workers
    );

    let security = validated_config.security.clone();
    let factory_state = app_state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(factory_state.clone()))
            .wrap(SessionAuthMiddlewareFactory)
            .wrap(Headers::new(&security))
            .wrap(Logger::new(ACCESS_LOG_FORMAT))
            .configure(public::configure)
    })
    .workers(validated_config.server.workers)
    .bind(validated_config.server.address_tuple())?
    .run();

    app_state.mark_ready();
    info!("✅ Accepting requests");
    server.await
}

fn log_startup_info(config: &ValidatedConfig, runtime_paths: &RuntimePaths) {
    info!("Starting {} - {}", config.app.name, config.app.description);
    info!("Workers: {}", config.server.workers);
    info!(
        "Listening on {}:{}",
        config.server.host, config.server.port
    );
    info!("Content file: {}", runtime_paths.content_file.display());
    info!(
        "Content directory (canonical): {}",
        runtime_paths.content_dir.display()
    );
    info!("Config file: {}", runtime_paths.config_file.display());
    info!("Users file: {}", runtime_paths.users_file.display());
    info!("Runtime root: {}", runtime_paths.root.display());

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {}", current_dir.display());
    }
}

fn help_text() -> String {
    [
        "Usage: nopgraph [-C <root>] [-F]",
        "",
        "  -C <root>   Runtime directory holding config.yaml, content.yaml,",
        "              users.yaml and the content/ blob directory (default: .)",
        "  -F          Run in the foreground (the default; accepted for scripts)",
        "  -h, --help  Show this help",
        "",
    ]
    .join("\n")
}

#[derive(Debug)]
enum RunMode {
    Serve,
    Help,
}

struct ParsedArgs {
    runtime_root: PathBuf,
    mode: RunMode,
}

fn parse_args() -> Result<ParsedArgs, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<ParsedArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    if args.iter().any(|arg| is_help_flag(arg)) {
        return Ok(ParsedArgs {
            runtime_root: PathBuf::from("."),
            mode: RunMode::Help,
        });
    }

    let mut args = args.into_iter();
    let mut runtime_root = PathBuf::from(".");
    let mut unexpected = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--" || arg == "-F" {
            continue;
        } else if arg == "-C" {
            let value = args
                .next()
                .ok_or_else(|| "Missing value for -C".to_string())?;
            runtime_root = PathBuf::from(value);
        } else {
            unexpected.push(arg);
        }
    }

    if unexpected.len() == 1 && unexpected[0].eq_ignore_ascii_case("help") {
        return Ok(ParsedArgs {
            runtime_root,
            mode: RunMode::Help,
        });
    }

    if !unexpected.is_empty() {
        return Err(format!("Unexpected arguments: {}", unexpected.join(" ")));
    }

    Ok(ParsedArgs {
        runtime_root: make_runtime_root_absolute(runtime_root)?,
        mode: RunMode::Serve,
    })
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

fn make_runtime_root_absolute(runtime_root: PathBuf) -> Result<PathBuf, String> {
    if runtime_root.is_absolute() {
        return Ok(runtime_root);
    }

    let current_dir = std::env::current_dir()
        .map_err(|error| format!("Failed to resolve current directory: {}", error))?;
    Ok(current_dir.join(runtime_root))
}
