mod cli;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveTime, Utc};
use clap::Parser;
use colored::{ColoredString, Colorize};
use uuid::Uuid;

use agenda_core::{
    bulk_transition, claim, set_supervisor_note, transition, Action, AgendaKind, BulkAction,
    BulkPolicy, Day, DayKind, ExecutionState, FileKv, Origin, Request, RequestBook,
    RequestDraft, RequestFilter, RequestStore, Role, Status,
};

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => agenda_core::default_data_dir()?,
    };
    let mut store = RequestStore::new(FileKv::new(&data_dir));
    let actor = cli
        .user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "anonymous".to_string());

    match &cli.command {
        Command::Submit {
            requester,
            days,
            agenda,
            note,
            attachment,
        } => submit_request(
            &mut store,
            Origin::Doctor,
            requester,
            days,
            agenda,
            note.as_deref(),
            attachment.as_deref(),
        )?,
        Command::Create {
            requester,
            days,
            agenda,
            note,
            attachment,
        } => submit_request(
            &mut store,
            Origin::Supervision,
            requester,
            days,
            agenda,
            note.as_deref(),
            attachment.as_deref(),
        )?,
        Command::List {
            search,
            origin,
            r#type,
            agenda,
            status,
            execution,
            from,
            to,
        } => list_requests(
            &mut store, search, origin, r#type, agenda, status, execution, from, to,
        )?,
        Command::Show { id } => show_request(&mut store, id)?,
        Command::Forward { id } => {
            apply_transition(&mut store, id, Action::Forward, Role::Supervisor, &actor)?
        }
        Command::Approve { id } => {
            apply_transition(&mut store, id, Action::Approve, Role::Directorate, &actor)?
        }
        Command::Reject { id } => {
            apply_transition(&mut store, id, Action::Reject, Role::Directorate, &actor)?
        }
        Command::Note { id, text } => add_note(&mut store, id, text)?,
        Command::Claim { id } => claim_request(&mut store, id, &actor)?,
        Command::SetStatus { id, status } => {
            let status = parse_status(status)?;
            apply_transition(&mut store, id, Action::SetStatus(status), Role::It, &actor)?
        }
        Command::BulkApprove { ids, strict } => {
            bulk_decide(&mut store, ids, BulkAction::Approve, *strict, &actor)?
        }
        Command::BulkReject { ids, strict } => {
            bulk_decide(&mut store, ids, BulkAction::Reject, *strict, &actor)?
        }
        Command::History { id } => show_history(&mut store, id)?,
    }

    Ok(())
}

fn load_book(store: &mut RequestStore<FileKv>) -> RequestBook {
    let outcome = store.load();
    if outcome.discarded_corrupt {
        eprintln!(
            "{}",
            "Warning: stored request data was corrupt and has been discarded; starting from an empty collection."
                .yellow()
        );
    }
    outcome.book
}

fn submit_request(
    store: &mut RequestStore<FileKv>,
    origin: Origin,
    requester: &str,
    day_specs: &[String],
    agenda: &str,
    note: Option<&str>,
    attachment: Option<&str>,
) -> Result<()> {
    let mut book = load_book(store);

    let mut draft = RequestDraft::new(requester, origin);
    for spec in day_specs {
        draft.set_day(parse_day(spec)?);
    }
    for kind in parse_agenda_list(agenda)? {
        draft.add_agenda_type(kind);
    }
    if let Some(note) = note {
        draft.note = note.to_string();
    }
    draft.attachment = attachment.map(|a| a.to_string());

    let number = store.next_request_number(Local::now().year())?;
    let request = draft.submit(number, Utc::now())?;
    let id = request.id;

    book.add(request);
    store.save(&book)?;

    let request = book.get(&id).expect("just added request");
    println!("{}", "Request recorded successfully!".green());
    println!("ID: {}", id);
    if let Some(number) = &request.request_number {
        println!("Number: {}", number.green());
    }
    println!("Status: {}", status_badge(request.status));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn list_requests(
    store: &mut RequestStore<FileKv>,
    search: &Option<String>,
    origin: &Option<String>,
    day_type: &Option<String>,
    agenda: &Option<String>,
    status: &Option<String>,
    execution: &Option<String>,
    from: &Option<String>,
    to: &Option<String>,
) -> Result<()> {
    let book = load_book(store);

    let filter = RequestFilter {
        search: search.clone(),
        origin: origin.as_deref().map(parse_origin).transpose()?,
        day_type: day_type.as_deref().map(parse_day_kind).transpose()?,
        agenda_type: agenda.as_deref().map(parse_agenda_kind).transpose()?,
        status: status.as_deref().map(parse_status).transpose()?,
        execution: execution.as_deref().map(parse_execution).transpose()?,
        from: from.as_deref().map(parse_date).transpose()?,
        to: to.as_deref().map(parse_date).transpose()?,
    };

    let matches: Vec<&Request> = filter.apply(&book.requests).collect();
    if matches.is_empty() {
        println!("No requests found.");
        return Ok(());
    }

    for request in &matches {
        let number = request.request_number.as_deref().unwrap_or("-");
        let submitted = request
            .submitted_at
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M");
        println!(
            "{:>8}  {:<12} {:<28} {:<11} {}  {}",
            number.bold(),
            status_badge(request.status),
            request.requester,
            request.origin.label(),
            request.agenda_label(),
            submitted
        );
        if let Some(owner) = &request.execution_owner {
            println!("          em execução por {}", owner.green());
        }
    }
    println!();
    println!("{} request(s)", matches.len());
    Ok(())
}

fn show_request(store: &mut RequestStore<FileKv>, id: &str) -> Result<()> {
    let book = load_book(store);
    let request = resolve(&book, id)?;

    println!("{}", request.requester.bold());
    if let Some(number) = &request.request_number {
        println!("Number: {}", number);
    }
    println!("ID: {}", request.id);
    println!("Status: {}", status_badge(request.status));
    println!("Origin: {}", request.origin);
    println!("Agenda: {}", request.agenda_label());
    println!(
        "Submitted: {}",
        request
            .submitted_at
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M")
    );
    println!("Days:");
    for day in &request.days {
        println!(
            "  {}  {} — {}",
            day.date.format("%d/%m/%Y"),
            day.day_type,
            day.start_time.format("%H:%M")
        );
    }
    if !request.note.is_empty() {
        println!("Note: {}", request.note);
    }
    if let Some(note) = &request.supervisor_note {
        println!("Supervision note: {}", note);
    }
    if let Some(attachment) = &request.attachment {
        println!("Attachment: {}", attachment);
    }
    if let Some(owner) = &request.execution_owner {
        println!("Execution owner: {}", owner.green());
    }
    Ok(())
}

fn show_history(store: &mut RequestStore<FileKv>, id: &str) -> Result<()> {
    let book = load_book(store);
    let request = resolve(&book, id)?;

    if request.execution_history.is_empty() {
        println!("No execution history.");
        return Ok(());
    }
    for entry in &request.execution_history {
        let when = entry.timestamp.with_timezone(&Local).format("%d/%m/%Y %H:%M");
        match entry.resulting_status {
            Some(status) => println!(
                "{}  {} {} ({})",
                when,
                entry.actor.bold(),
                entry.action,
                status_badge(status)
            ),
            None => println!("{}  {} {}", when, entry.actor.bold(), entry.action),
        }
    }
    Ok(())
}

fn apply_transition(
    store: &mut RequestStore<FileKv>,
    id: &str,
    action: Action,
    role: Role,
    actor: &str,
) -> Result<()> {
    let mut book = load_book(store);
    let uuid = resolve(&book, id)?.id;

    let status = transition(&mut book, uuid, action, role, actor)?;
    store.save(&book)?;
    println!("Request {} is now {}", id.bold(), status_badge(status));
    Ok(())
}

fn claim_request(store: &mut RequestStore<FileKv>, id: &str, actor: &str) -> Result<()> {
    let mut book = load_book(store);
    let uuid = resolve(&book, id)?.id;

    claim(&mut book, uuid, actor)?;
    store.save(&book)?;
    println!(
        "{}",
        format!("Request {} is now being executed by {}", id, actor).green()
    );
    Ok(())
}

fn add_note(store: &mut RequestStore<FileKv>, id: &str, text: &str) -> Result<()> {
    let mut book = load_book(store);
    let uuid = resolve(&book, id)?.id;

    set_supervisor_note(&mut book, uuid, text)?;
    store.save(&book)?;
    println!("{}", "Supervision note recorded.".green());
    Ok(())
}

fn bulk_decide(
    store: &mut RequestStore<FileKv>,
    ids: &[String],
    action: BulkAction,
    strict: bool,
    actor: &str,
) -> Result<()> {
    let mut book = load_book(store);
    let uuids: Vec<Uuid> = ids
        .iter()
        .map(|id| resolve(&book, id).map(|r| r.id))
        .collect::<Result<_>>()?;

    let policy = if strict {
        BulkPolicy::FailOnIneligible
    } else {
        BulkPolicy::SkipIneligible
    };
    let outcome = bulk_transition(&mut book, &uuids, action, actor, policy)?;
    store.save(&book)?;

    println!(
        "{}",
        format!("{} request(s) updated.", outcome.changed.len()).green()
    );
    if !outcome.skipped.is_empty() {
        println!(
            "{}",
            format!(
                "{} request(s) skipped (no longer awaiting a decision).",
                outcome.skipped.len()
            )
            .yellow()
        );
    }
    Ok(())
}

/// Accepts either a UUID or a human-readable "N/YYYY" number.
fn resolve<'a>(book: &'a RequestBook, id: &str) -> Result<&'a Request> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        if let Some(request) = book.get(&uuid) {
            return Ok(request);
        }
    }
    if let Some(request) = book.get_by_number(id) {
        return Ok(request);
    }
    bail!("Request not found: {}", id)
}

/// Day spec: DATE[@HH:MM[@abertura|fechamento]].
fn parse_day(spec: &str) -> Result<Day> {
    let mut parts = spec.split('@');
    let date = parts
        .next()
        .context("empty day spec")?
        .parse()
        .with_context(|| format!("Invalid date in day spec '{}'", spec))?;
    let start_time = match parts.next() {
        Some(time) => NaiveTime::parse_from_str(time, "%H:%M")
            .with_context(|| format!("Invalid time in day spec '{}'", spec))?,
        None => NaiveTime::from_hms_opt(8, 0, 0).expect("valid constant time"),
    };
    let day_type = match parts.next() {
        Some(kind) => parse_day_kind(kind)?,
        None => DayKind::Opening,
    };
    if parts.next().is_some() {
        bail!("Too many '@' segments in day spec '{}'", spec);
    }
    Ok(Day {
        date,
        start_time,
        day_type,
    })
}

fn parse_agenda_list(csv: &str) -> Result<Vec<AgendaKind>> {
    csv.split(',').map(parse_agenda_kind).collect()
}

fn parse_agenda_kind(s: &str) -> Result<AgendaKind> {
    AgendaKind::parse(s).with_context(|| format!("Unknown agenda type: {}", s))
}

fn parse_day_kind(s: &str) -> Result<DayKind> {
    DayKind::parse(s).with_context(|| format!("Unknown day type: {}", s))
}

fn parse_origin(s: &str) -> Result<Origin> {
    Origin::parse(s).with_context(|| format!("Unknown origin: {}", s))
}

fn parse_status(s: &str) -> Result<Status> {
    Status::parse(s).with_context(|| format!("Unknown status: {}", s))
}

fn parse_execution(s: &str) -> Result<ExecutionState> {
    ExecutionState::parse(&s.replace('-', " "))
        .with_context(|| format!("Unknown execution state: {}", s))
}

fn parse_date(s: &str) -> Result<chrono::NaiveDate> {
    s.parse()
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", s))
}

fn status_badge(status: Status) -> ColoredString {
    match status {
        Status::Pending => status.label().yellow(),
        Status::Forwarded => status.label().blue(),
        Status::Approved => status.label().green(),
        Status::Rejected => status.label().red(),
        Status::Completed => status.label().normal(),
    }
}
