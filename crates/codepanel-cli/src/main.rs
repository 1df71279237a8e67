// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use codepanel_app::PanelState;
use config::Config;
use logging::LogTarget;
use std::env;
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `codepanel --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    match options.command {
        Command::Panel => run_panel(&config, &options),
        Command::Serve => {
            let store = runtime::open_store(&db_path)?;
            if options.demo {
                runtime::seed_demo(&store)?;
            }
            let server = runtime::bind_server(&config, store)?;
            if options.check_only {
                return Ok(());
            }
            logging::init(&LogTarget::Stderr)?;
            tracing::info!(db = %db_path.display(), "opened store");
            server.serve()
        }
        Command::Import(file) => {
            let store = runtime::open_store(&db_path)?;
            if options.check_only {
                return Ok(());
            }
            let count = runtime::import_file(&store, &file)?;
            println!("imported {count} documents into {}", db_path.display());
            Ok(())
        }
        Command::Export => {
            let store = runtime::open_store(&db_path)?;
            if options.check_only {
                return Ok(());
            }
            println!("{}", runtime::export_json(&store)?);
            Ok(())
        }
    }
}

fn run_panel(config: &Config, options: &CliOptions) -> Result<()> {
    let (mut backend, title) = runtime::build_backend(config, options.demo).with_context(|| {
        format!(
            "invalid [backend] config in {}; fix kind/base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        return Ok(());
    }

    logging::init(&LogTarget::File(logging::default_log_path()?))?;
    tracing::info!(backend = %title, "starting panel");
    let mut state = PanelState::new(config.panel_settings());
    codepanel_tui::run_app(&mut state, backend.as_mut(), &title)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Panel,
    Serve,
    Import(PathBuf),
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    command: Command,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        command: Command::Panel,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };
    let mut command_seen = false;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            flag if flag.starts_with('-') => {
                bail!("unknown argument {flag:?}; run with --help to see supported options");
            }
            word => {
                if command_seen {
                    bail!("unexpected argument {word:?}; only one command may be given");
                }
                command_seen = true;
                options.command = match word {
                    "serve" => Command::Serve,
                    "export" => Command::Export,
                    "import" => {
                        let file = iter
                            .next()
                            .ok_or_else(|| anyhow!("import requires a JSON file path"))?;
                        Command::Import(PathBuf::from(file.as_ref()))
                    }
                    other => bail!(
                        "unknown command {other:?}; use serve, import <file.json>, or export"
                    ),
                };
            }
        }
    }

    if options.demo && matches!(options.command, Command::Import(_) | Command::Export) {
        bail!(
            "--demo uses a throwaway in-memory store; drop it to import into or export from the configured database"
        );
    }

    Ok(options)
}

fn print_help() {
    println!("codepanel: admin panel for landing-page codes");
    println!();
    println!("usage: codepanel [options] [command]");
    println!();
    println!("commands:");
    println!("  (none)                   Open the panel against the configured backend");
    println!("  serve                    Run the local JSON REST server");
    println!("  import <file.json>       Append a data.json array to the server store");
    println!("  export                   Print the server store as a JSON array");
    println!();
    println!("options:");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Use in-memory demo rows (panel and serve only)");
    println!("  --check                  Validate config, backend and store, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, Command, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/codepanel-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_panel_and_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                command: Command::Panel,
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml", "serve"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        assert_eq!(options.command, Command::Serve);
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_reads_import_path() -> Result<()> {
        let options = parse_cli_args(vec!["import", "data.json"], default_options_path())?;
        assert_eq!(options.command, Command::Import(PathBuf::from("data.json")));

        let error = parse_cli_args(vec!["import"], default_options_path())
            .expect_err("import without a file should fail");
        assert!(error.to_string().contains("import requires a JSON file path"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_demo_for_store_commands() -> Result<()> {
        for args in [vec!["import", "data.json", "--demo"], vec!["--demo", "export"]] {
            let error = parse_cli_args(args, default_options_path())
                .expect_err("--demo with a store command should fail");
            assert!(error.to_string().contains("in-memory store"));
        }

        let options = parse_cli_args(vec!["serve", "--demo"], default_options_path())?;
        assert!(options.demo);
        assert_eq!(options.command, Command::Serve);
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_unknown_and_repeated_commands() {
        let error = parse_cli_args(vec!["launch"], default_options_path())
            .expect_err("unknown command should fail");
        assert!(error.to_string().contains("unknown command \"launch\""));

        let error = parse_cli_args(vec!["serve", "export"], default_options_path())
            .expect_err("two commands should fail");
        assert!(error.to_string().contains("only one command"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check", "export"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.print_db_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        assert_eq!(options.command, Command::Export);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_and_db_path_flags() -> Result<()> {
        let options = parse_cli_args(vec!["-h", "--print-path"], default_options_path())?;
        assert!(options.show_help);
        assert!(options.print_db_path);
        Ok(())
    }
}
