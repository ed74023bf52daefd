//! SAMD Flasher - Entry Point
//!
//! Lists attached QT Py boards and flashes one of them with bossac.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use samd_flasher::filesys::file::File;
use samd_flasher::logs::{init_logging, LogFormat, LogLevel};
use samd_flasher::storage::settings::Settings;
use samd_flasher::utils::{parse_cli_args, version_info};
use samd_flasher::{Board, CancelToken, FlashRequest, Flasher, FlasherError};

use tracing::{error, info, warn};

const USAGE: &str = "\
Usage:
  samd-flasher --list [--config=<file>]
  samd-flasher --flash --firmware=<file> [--serial=<sn> | --port=<path>] [--config=<file>]
  samd-flasher --version

Options:
  --log-level=<trace|debug|info|warn|error>
  --log-format=<text|json>";

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args: HashMap<String, String> = parse_cli_args(env::args().skip(1))
        .into_iter()
        .collect();

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to format version info: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let mut settings = match cli_args.get("config") {
        Some(path) => match Settings::load(&File::new(path)).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };

    if let Some(level) = cli_args.get("log-level") {
        match level.parse::<LogLevel>() {
            Ok(level) => settings.log_level = level,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(format) = cli_args.get("log-format") {
        match format.parse::<LogFormat>() {
            Ok(format) => settings.log_format = format,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    // Initialize logging
    if let Err(e) = init_logging(settings.log_options()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let flasher = Flasher::system(&settings);

    let result = if cli_args.contains_key("list") {
        list_boards(&flasher)
    } else if cli_args.contains_key("flash") {
        flash(&flasher, &cli_args).await
    } else {
        println!("{}", USAGE);
        return ExitCode::FAILURE;
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_boards(flasher: &Flasher) -> Result<bool, FlasherError> {
    let boards = flasher.list_boards()?;
    if boards.is_empty() {
        let known: Vec<String> = flasher
            .catalog()
            .known_devices()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("No boards connected (looking for {}).", known.join(", "));
        return Ok(true);
    }

    for board in boards {
        println!(
            "{:<24} {:<34} {:<24} {}",
            board.display_name,
            board.serial_number,
            board.port_path,
            board.usb_id()
        );
    }
    Ok(true)
}

fn select_board(
    flasher: &Flasher,
    cli_args: &HashMap<String, String>,
) -> Result<Board, FlasherError> {
    if let Some(serial) = cli_args.get("serial") {
        return flasher
            .catalog()
            .find_board(serial)?
            .ok_or_else(|| FlasherError::NotFound(format!("no board with serial {}", serial)));
    }

    let mut boards = flasher.list_boards()?;
    if let Some(port) = cli_args.get("port") {
        return boards
            .into_iter()
            .find(|board| &board.port_path == port)
            .ok_or_else(|| FlasherError::NotFound(format!("no board at {}", port)));
    }

    match boards.len() {
        0 => Err(FlasherError::NotFound("no boards connected".to_string())),
        1 => Ok(boards.remove(0)),
        n => Err(FlasherError::ConfigError(format!(
            "{} boards connected, pick one with --serial or --port",
            n
        ))),
    }
}

async fn flash(
    flasher: &Flasher,
    cli_args: &HashMap<String, String>,
) -> Result<bool, FlasherError> {
    let firmware = cli_args
        .get("firmware")
        .ok_or_else(|| FlasherError::ConfigError("--firmware=<file> is required".to_string()))?;
    let firmware = File::new(firmware);
    if !firmware.is_file().await {
        return Err(FlasherError::NotFound(format!(
            "firmware file {}",
            firmware.path().display()
        )));
    }

    let board = select_board(flasher, cli_args)?;
    info!("Selected board {}", board);

    let cancel = CancelToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, cancelling at the next safe point...");
            ctrl_c_cancel.cancel();
        }
    });

    println!("Beginning flashing process.");
    let job = flasher.spawn(FlashRequest::new(board, firmware.path()), cancel);
    let outcome = job
        .follow(|message| {
            if message.ok {
                println!("{}", message.text);
            } else {
                eprintln!("{}", message.text);
            }
        })
        .await?;

    Ok(outcome.is_success())
}
