use atty::Stream;
use clap::{error::ErrorKind, Parser};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use wheelship_core::{
    CommandContext, CommandStatus, ConfigOverrides, ExecutionOutcome, ReleaseRequest,
    ReleaseVersion,
};

mod cli;
mod style;

use cli::WheelshipCli;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = match WheelshipCli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            err.print()?;
            std::process::exit(code);
        }
    };
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let overrides = ConfigOverrides {
        project: cli.project.clone(),
        package: cli.package.clone(),
        repository: cli.repository.clone(),
    };
    let ctx = CommandContext::new(&overrides).map_err(|err| eyre!("{err:?}"))?;
    let request = ReleaseRequest {
        version: ReleaseVersion::new(cli.release_version.as_str()),
        dry_run: cli.dry_run,
    };
    let outcome = wheelship_core::release(&ctx, &request).map_err(|err| eyre!("{err:?}"))?;
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("wheelship_core={level},wheelship_domain={level},wheelship_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &WheelshipCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = wheelship_core::to_json_response(outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let upload = detail_str(&outcome.details, "upload_command");
    if cli.quiet {
        // stdout carries only the upload command; failures go to stderr.
        if outcome.status == CommandStatus::Ok {
            if let Some(upload) = upload {
                println!("{upload}");
            }
        } else {
            let style = Style::new(cli.no_color, atty::is(Stream::Stderr));
            let message = wheelship_core::format_status_message(&outcome.message);
            eprintln!("{}", style.status(outcome.status, &message));
            if let Some(hint) = detail_str(&outcome.details, "hint") {
                eprintln!("{}", style.info(&format!("Hint: {hint}")));
            }
        }
        return Ok(code);
    }

    let message = wheelship_core::format_status_message(&outcome.message);
    println!("{}", style.status(outcome.status, &message));
    if let Some(hint) = detail_str(&outcome.details, "hint") {
        println!("{}", style.info(&format!("Hint: {hint}")));
    }

    if outcome.status != CommandStatus::Ok {
        if let Some(command) = detail_str(&outcome.details, "command") {
            println!("{}", style.dimmed(&format!("  command: {command}")));
        }
        for stage in string_list(&outcome.details, "stages") {
            println!("{}", style.stage(stage, true));
        }
        println!("{}", style.stage("stopped", false));
        return Ok(code);
    }

    if outcome.details.get("dry_run").and_then(Value::as_bool) == Some(true) {
        for planned in outcome
            .details
            .get("commands")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let stage = detail_str(planned, "stage").unwrap_or_default();
            let command = detail_str(planned, "command").unwrap_or_default();
            println!("  {} {}", style.dimmed(&format!("[{stage}]")), command);
        }
    } else {
        for artifact in outcome
            .details
            .get("artifacts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let path = detail_str(artifact, "path").unwrap_or_default();
            let sha = detail_str(artifact, "sha256").unwrap_or_default();
            let bytes = artifact.get("bytes").and_then(Value::as_u64).unwrap_or(0);
            println!(
                "  {path} {}",
                style.dimmed(&format!("({bytes} bytes, sha256 {})", short_digest(sha)))
            );
        }
    }

    if let Some(upload) = upload {
        println!();
        println!("{}", style.info("Upload with:"));
        println!("  {}", style.command(upload));
    }
    Ok(code)
}

fn detail_str<'a>(details: &'a Value, key: &str) -> Option<&'a str> {
    details
        .as_object()
        .and_then(|map| map.get(key))
        .and_then(Value::as_str)
}

fn string_list<'a>(details: &'a Value, key: &str) -> Vec<&'a str> {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn short_digest(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}
