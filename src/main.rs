use color_eyre::eyre::{Result, eyre};
use joybit::client::{self, AppConfig};
use std::path::PathBuf;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
joybit - match-3 with on-ledger rewards

USAGE:
    joybit [OPTIONS]

OPTIONS:
    --player <name>     player name (default: player1)
    --level <n>         start at level n instead of resuming
    --data-dir <path>   ledger/stats directory (default: ./joybit-data)
    --seed <n>          fixed board seed, for reproducing a game
    --help              print this help
";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = match parse_cli_args(std::env::args().skip(1)) {
        Ok(Some(config)) => config,
        Ok(None) => {
            print!("{USAGE}");
            return Ok(());
        }
        Err(error) => {
            eprint!("{USAGE}");
            return Err(error);
        }
    };

    // The terminal owns stdout, so logs go to a daily file instead.
    let file = rolling::daily(config.data_dir.join("logs"), "joybit.log");
    let (writer, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    client::run_app(&config).await
}

/// Hand-rolled flag parsing; `Ok(None)` means help was requested.
fn parse_cli_args(
    mut args: impl Iterator<Item = String>,
) -> Result<Option<AppConfig>> {
    let mut player = None;
    let mut level = None;
    let mut data_dir = None;
    let mut seed = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next().ok_or_else(|| eyre!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--player" => {
                if player.is_some() {
                    return Err(eyre!("--player given twice"));
                }
                player = Some(value("--player")?);
            }
            "--level" => {
                if level.is_some() {
                    return Err(eyre!("--level given twice"));
                }
                let raw = value("--level")?;
                let parsed: u32 = raw
                    .parse()
                    .map_err(|_| eyre!("invalid --level: {raw}"))?;
                if parsed == 0 {
                    return Err(eyre!("levels start at 1"));
                }
                level = Some(parsed);
            }
            "--data-dir" => {
                if data_dir.is_some() {
                    return Err(eyre!("--data-dir given twice"));
                }
                data_dir = Some(PathBuf::from(value("--data-dir")?));
            }
            "--seed" => {
                if seed.is_some() {
                    return Err(eyre!("--seed given twice"));
                }
                let raw = value("--seed")?;
                seed = Some(
                    raw.parse()
                        .map_err(|_| eyre!("invalid --seed: {raw}"))?,
                );
            }
            unknown => return Err(eyre!("unknown argument: {unknown}")),
        }
    }

    Ok(Some(AppConfig {
        player: player.unwrap_or_else(|| String::from("player1")),
        level,
        data_dir: data_dir.unwrap_or_else(|| PathBuf::from("joybit-data")),
        seed,
    }))
}
