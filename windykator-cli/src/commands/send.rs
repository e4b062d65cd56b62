//! Send command - dispatch reminders for a loaded file

use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use super::{get_context, get_logger, load_pipeline, log_event, LoadArgs};
use crate::output;
use windykator_core::adapters::DryRunSender;
use windykator_core::ports::{EmailSender, SmsSender};
use windykator_core::services::LogEvent;
use windykator_core::{Channel, DispatchReport, REQUIRED_FIELDS};

#[derive(Args)]
pub struct SendArgs {
    #[command(flatten)]
    load: LoadArgs,
    /// Send email reminders
    #[arg(long)]
    email: bool,
    /// Send SMS reminders
    #[arg(long)]
    sms: bool,
    /// Only these row numbers (as shown by preview)
    #[arg(long, value_delimiter = ',')]
    rows: Option<Vec<usize>>,
    /// Render everything but deliver nothing
    #[arg(long)]
    dry_run: bool,
    /// Mark messages as tests (SMS go to sms.testNumber when set)
    #[arg(long)]
    test: bool,
    /// Evaluate days overdue as of this date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,
    /// Skip confirmation prompt
    #[arg(long, short)]
    yes: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: SendArgs) -> Result<()> {
    if !args.email && !args.sms {
        anyhow::bail!("Choose at least one channel: --email and/or --sms");
    }

    let ctx = get_context()?;
    let (pipeline, _) = load_pipeline(&ctx, &args.load, args.json)?;
    pipeline.require_mapping(&REQUIRED_FIELDS)?;

    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let records = pipeline.preview_all(today);
    if let Some(rows) = &args.rows {
        if let Some(bad) = rows.iter().find(|&&r| r >= records.len()) {
            anyhow::bail!("Row {} does not exist (file has {} rows)", bad, records.len());
        }
    }
    let count = args.rows.as_ref().map_or(records.len(), Vec::len);
    if count == 0 {
        anyhow::bail!("Nothing to send");
    }

    let dry_run = DryRunSender::new();
    let (graph, smsapi) = if args.dry_run {
        (None, None)
    } else {
        (
            if args.email { ctx.email_sender()? } else { None },
            if args.sms { ctx.sms_sender()? } else { None },
        )
    };
    let email_sender: Option<&dyn EmailSender> = if args.dry_run {
        Some(&dry_run)
    } else {
        graph.as_ref().map(|s| s as &dyn EmailSender)
    };
    let sms_sender: Option<&dyn SmsSender> = if args.dry_run {
        Some(&dry_run)
    } else {
        smsapi.as_ref().map(|s| s as &dyn SmsSender)
    };

    if !args.json {
        if args.email && email_sender.is_none() {
            output::warning("Email is not configured (email.accessToken, email.mailbox); email rows will fail");
        }
        if args.sms && sms_sender.is_none() {
            output::warning("SMS is not configured (sms.token); SMS rows will fail");
        }
    }

    let mut dispatcher = ctx.dispatcher(email_sender, sms_sender, args.test)?;
    if args.dry_run {
        dispatcher = dispatcher.with_delay(Duration::ZERO);
    }
    let templates = ctx.templates(args.email, args.sms)?;
    let test_mode = args.test || ctx.config.test_mode();

    if !args.yes && !args.json {
        let channels: Vec<&str> = [(args.email, "email"), (args.sms, "SMS")]
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        let mode = match (args.dry_run, test_mode) {
            (true, _) => " (dry run)",
            (false, true) => " (test mode)",
            (false, false) => "",
        };
        let prompt = format!("Send {} to {} recipients{}?", channels.join(" and "), count, mode);
        if !Confirm::new().with_prompt(prompt).default(false).interact()? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let logger = get_logger();
    log_event(&logger, LogEvent::new("dispatch_started").with_command("send"));

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(count as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };

    let report = dispatcher.run(&records, args.rows.as_deref(), &templates, |outcome| {
        progress.set_message(outcome.kontrahent.clone());
        progress.inc(1);
    });
    progress.finish_and_clear();

    for channel in [Channel::Email, Channel::Sms] {
        let failed = report.failed(channel);
        if failed > 0 {
            log_event(
                &logger,
                LogEvent::new("delivery_failed")
                    .with_channel(channel)
                    .with_command("send")
                    .with_error(format!("{} of {} failed", failed, failed + report.sent(channel))),
            );
        }
    }
    log_event(&logger, LogEvent::new("dispatch_completed").with_command("send"));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report, args.email, args.sms);
    if args.dry_run {
        output::info(&format!("Dry run: {} messages rendered, none delivered", dry_run.messages().len()));
    }
    Ok(())
}

fn print_report(report: &DispatchReport, email: bool, sms: bool) {
    let mut table = output::create_table();
    let mut header = vec!["#", "Kontrahent", "Faktura"];
    if email {
        header.push("Email");
    }
    if sms {
        header.push("SMS");
    }
    table.set_header(header);

    for outcome in &report.results {
        let mut row = vec![
            outcome.row_index.to_string(),
            output::truncate(&outcome.kontrahent, 30),
            outcome.nr_faktury.clone(),
        ];
        if email {
            row.push(output::delivery_cell(outcome.status(Channel::Email)));
        }
        if sms {
            row.push(output::delivery_cell(outcome.status(Channel::Sms)));
        }
        table.add_row(row);
    }
    println!("{}", table);

    if report.test_mode {
        println!("{}", "TEST MODE".yellow().bold());
    }
    for (enabled, channel) in [(email, Channel::Email), (sms, Channel::Sms)] {
        if !enabled {
            continue;
        }
        let sent = report.sent(channel);
        let failed = report.failed(channel);
        let line = format!("{}: {} sent, {} failed", channel, sent, failed);
        if failed == 0 {
            output::success(&line);
        } else {
            output::warning(&line);
        }
    }
}
