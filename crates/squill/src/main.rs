use squill::app::{App, CommandOutcome, format_error, format_result, format_script_result};
use squill::cli;
use squill_core::{StatementOutcome, sql};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_INTERRUPT: i32 = 130;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let started = Instant::now();

    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) if e.0.starts_with("Usage:") => {
            println!("{}", e.0);
            return EXIT_OK;
        }
        Err(e) => {
            eprintln!("squill: {}", e);
            eprintln!("{}", cli::usage());
            return EXIT_ERROR;
        }
    };

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Hidden worker mode: this process serves queries over the socket the
    // parent is connected to, then exits.
    if let Some(socket) = &args.worker_socket {
        let registry = Arc::new(squill_providers::default_registry());
        return match squill_worker::run_worker_mode(
            socket,
            registry,
            Some(Arc::new(squill_ssh::SshTunnelFactory)),
        ) {
            Ok(()) => EXIT_OK,
            Err(e) => {
                eprintln!("squill worker: {}", e);
                EXIT_ERROR
            }
        };
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("squill: failed to start runtime: {}", e);
            return EXIT_ERROR;
        }
    };
    let _guard = runtime.enter();

    let mut app = match App::new(&args) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("squill: {}", e);
            return EXIT_ERROR;
        }
    };

    if args.profile_startup {
        report_startup(started, args.startup_mark);
    }

    let code = repl(&mut app);
    app.shutdown();
    code
}

fn report_startup(started: Instant, startup_mark: Option<f64>) {
    let in_process_ms = started.elapsed().as_secs_f64() * 1000.0;
    match startup_mark.and_then(|mark| {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        Some((now.as_secs_f64() - mark) * 1000.0)
    }) {
        Some(total_ms) => println!(
            "startup: {:.1}ms in-process, {:.1}ms since launch",
            in_process_ms, total_ms
        ),
        None => println!("startup: {:.1}ms in-process", in_process_ms),
    }
}

/// Line-driven shell: `:` commands and SQL statements. The full-screen
/// frontend drives `App` through the same entry points.
fn repl(app: &mut App) -> i32 {
    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("squill> ");
        if std::io::stdout().flush().is_err() {
            return EXIT_ERROR;
        }

        line.clear();
        match stdin.lock().read_line(&mut line) {
            // EOF: clean exit.
            Ok(0) => return EXIT_OK,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return EXIT_INTERRUPT,
            Err(e) => {
                eprintln!("squill: {}", e);
                return EXIT_ERROR;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix(':') {
            match app.run_command(command) {
                Ok(CommandOutcome::Quit) => return EXIT_OK,
                Ok(CommandOutcome::Continue) => {}
                Ok(CommandOutcome::Message(message)) => println!("{}", message),
                Err(e) => println!("{}", format_error(&e.0)),
            }
            continue;
        }

        execute_input(app, input);
    }
}

fn execute_input(app: &mut App, input: &str) {
    if sql::split_statements(input).len() > 1 {
        match app.execute_script(input) {
            Ok(result) => println!("{}", format_script_result(&result)),
            Err(e) => println!("{}", format_error(&e.to_string())),
        }
        return;
    }

    match app.execute(input) {
        Ok(report) => {
            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            match &report.outcome {
                StatementOutcome::Query(result) => println!("{}", format_result(result)),
                StatementOutcome::NonQuery(result) => {
                    println!("({} rows affected)", result.rows_affected)
                }
            }
            println!("elapsed: {:.1}ms", report.elapsed.as_secs_f64() * 1000.0);
        }
        Err(e) => println!("{}", format_error(&e.to_string())),
    }
}
