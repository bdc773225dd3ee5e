use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{ApiClient, ClientOptions};
use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::component::{
    EditOutcome, EventOutcome, HistoryList, LoadOutcome, PageHost, SessionToastHost, SubmitOutcome,
};
use crate::config::{self, ConfigFile};
use crate::entity::{Entity, RecordId};
use crate::location::PageLocation;
use crate::output::{self, OutputFormat, SectionView};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, Toast, ToastKind, TOKEN_KEY};

pub const LOG_ENV: &str = "MEDHISTORY_LOG";

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    out.push_str(cmd.get_name());
    if let Some(version) = cmd.get_version() {
        out.push(' ');
        out.push_str(version);
    }
    out.push('\n');

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(cmd.get_name());
    out.push_str(" [OPTIONS]\n\n");

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }
        let heading = arg.get_help_heading().unwrap_or("Options").to_string();
        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };
        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let mut parts: Vec<String> = Vec::new();
            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }
            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }
            if let Some(aliases) = arg.get_visible_aliases() {
                for alias in aliases {
                    let rendered = format!("--{alias}");
                    if !parts.iter().any(|p| p == &rendered) {
                        parts.push(rendered);
                    }
                }
            }

            let mut flags = parts.join(", ");
            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }
            out.push('\n');
        }
    }

    out
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| format!("medhistory={default_level}"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[derive(Clone, Debug)]
struct RunConfig {
    location: PageLocation,
    patient_id: String,
    entities: Vec<Entity>,
    page: Option<u32>,
    edit: Option<RecordId>,
    add: bool,
    assignments: Vec<(String, String)>,
    endpoint: String,
    timeout: u64,
    proxy: Option<String>,
    token: Option<String>,
    storage_path: PathBuf,
    output: Option<String>,
    output_format: OutputFormat,
    no_color: bool,
    verbose: u8,
}

fn select_entities(args: &CliArgs, cfg: &ConfigFile) -> Result<Vec<Entity>, String> {
    let raw: Vec<String> = if !args.entity.is_empty() {
        args.entity.clone()
    } else if let Some(list) = cfg.entities.as_ref().filter(|l| !l.is_empty()) {
        list.clone()
    } else {
        return Ok(Entity::ALL.to_vec());
    };

    let mut out: Vec<Entity> = Vec::new();
    for item in raw {
        for entity in crate::utils::parse_entities_csv(&item)
            .map_err(|e| format!("invalid entity list '{item}': {e}"))?
        {
            if !out.contains(&entity) {
                out.push(entity);
            }
        }
    }
    Ok(out)
}

fn build_location(args: &CliArgs, cfg: &ConfigFile, endpoint: &str) -> Result<PageLocation, String> {
    let base = args
        .page_url
        .clone()
        .or_else(|| cfg.page_url.clone())
        .unwrap_or_else(|| format!("{endpoint}/patient/view"));
    let mut location = PageLocation::parse(&base).map_err(|e| e.to_string())?;
    if let Some(patient) = args.patient.as_deref() {
        location.set_query_param(crate::location::PATIENT_PARAM, patient.trim());
    }
    Ok(location)
}

fn build_run_config(args: CliArgs, cfg: ConfigFile, env_endpoint: Option<String>) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let endpoint = config::resolve_endpoint(args.endpoint.as_deref(), env_endpoint.as_deref(), &cfg);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    let proxy = args
        .proxy
        .clone()
        .or_else(|| cfg.proxy.clone())
        .filter(|p| !p.trim().is_empty());

    let location = build_location(&args, &cfg, &endpoint)?;
    let patient_id = location
        .patient_id()
        .ok_or_else(|| "no patient id, pass --patient or a --page-url with ?id=".to_string())?;

    let entities = select_entities(&args, &cfg)?;

    let page = match args.page.as_deref() {
        Some(raw) => Some(crate::utils::parse_page_number(raw)?),
        None => None,
    };

    let edit = match args.edit.as_deref() {
        Some(raw) => Some(raw.parse::<RecordId>()?),
        None => None,
    };
    if edit.is_some() || args.add {
        let flag = if args.add { "--add" } else { "--edit" };
        match entities.as_slice() {
            [entity] if entity.schema().editable() => {}
            [entity] => return Err(format!("{} records are read-only", entity.schema().title)),
            _ => return Err(format!("{flag} requires exactly one --entity")),
        }
    }

    let mut assignments = Vec::with_capacity(args.set.len());
    for raw in &args.set {
        let (field, value) = crate::utils::parse_field_assignment(raw)?;
        if let [entity] = entities.as_slice() {
            if !entity.schema().is_editable_field(&field) {
                return Err(format!(
                    "unknown field '{field}' for {}",
                    entity.schema().title
                ));
            }
        }
        assignments.push((field, value));
    }

    let storage_path = match args.storage.as_deref().or(cfg.storage_path.as_deref()) {
        Some(path) => config::expand_tilde(path),
        None => config::default_storage_path()
            .ok_or_else(|| "could not determine home directory for storage".to_string())?,
    };

    let output = args
        .output
        .clone()
        .or_else(|| cfg.output.clone())
        .map(|p| config::expand_tilde(&p).to_string_lossy().to_string());
    let output_format = match args.output_format.as_deref().or(cfg.output_format.as_deref()) {
        Some(raw) => OutputFormat::parse(raw).ok_or_else(|| format!("invalid output format '{raw}'"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    Ok(RunConfig {
        location,
        patient_id,
        entities,
        page,
        edit,
        add: args.add,
        assignments,
        endpoint,
        timeout,
        proxy,
        token: args.token.clone().filter(|t| !t.trim().is_empty()),
        storage_path,
        output,
        output_format,
        no_color,
        verbose: args.verbose,
    })
}

fn build_lists(
    entities: &[Entity],
    api: &Arc<ApiClient>,
    location: &Arc<Mutex<PageLocation>>,
) -> Vec<Arc<HistoryList>> {
    entities
        .iter()
        .map(|entity| Arc::new(HistoryList::new(*entity, api.clone(), location.clone())))
        .collect()
}

async fn load_all(lists: &[Arc<HistoryList>], page: Option<u32>, pb: &ProgressBar) {
    let mut tasks = FuturesUnordered::new();
    for list in lists {
        let list = list.clone();
        tasks.push(async move {
            let mut outcome = list.bootstrap().await;
            if let (Some(page), LoadOutcome::Rendered) = (page, outcome) {
                if page != 1 {
                    outcome = list.load_page(page).await;
                }
            }
            (list.entity(), outcome)
        });
    }
    while let Some((entity, outcome)) = tasks.next().await {
        pb.set_message(format!("{} {:?}", entity.schema().title, outcome));
        match outcome {
            LoadOutcome::Rendered => info!(%entity, "list rendered"),
            LoadOutcome::Stale => info!(%entity, "list superseded by a newer load"),
            LoadOutcome::Failed => warn!(%entity, "list could not be loaded"),
        }
    }
}

async fn collect_sections(lists: &[Arc<HistoryList>]) -> Vec<SectionView> {
    let mut sections = Vec::with_capacity(lists.len());
    for list in lists {
        let view = list.view().await;
        sections.push(output::build_section(list.schema(), &view));
    }
    sections
}

fn print_toast(toast: &Toast) {
    match toast.kind {
        ToastKind::Success => println!(":: {} :: {}", "success".green().bold(), toast.message),
        ToastKind::Error => println!(":: {} :: {}", "error".red().bold(), toast.message),
    }
}

fn new_spinner() -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} Loading :: [{elapsed_precise}] :: {msg}")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    Ok(pb)
}

async fn run_edit(
    list: &HistoryList,
    record_id: RecordId,
    assignments: &[(String, String)],
    host: &SessionToastHost,
) -> Result<Option<SubmitOutcome>, String> {
    match list.begin_edit(record_id).await {
        EditOutcome::Opened(_) => {}
        EditOutcome::Unavailable(id) | EditOutcome::Superseded(id) => {
            return Err(format!("record {id} could not be loaded for editing"));
        }
        EditOutcome::NotEditable => {
            return Err(format!("{} records are read-only", list.schema().title));
        }
    }
    if assignments.is_empty() {
        return Ok(None);
    }
    for (field, value) in assignments {
        if !list.set_form_value(field, value).await {
            return Err(format!("unknown field '{field}'"));
        }
    }
    let outcome = list.submit().await;
    host.apply(&outcome)
        .map_err(|e| format!("failed to queue notification: {e}"))?;
    Ok(Some(outcome))
}

async fn run_add(
    list: &HistoryList,
    assignments: &[(String, String)],
    host: &SessionToastHost,
) -> Result<(), String> {
    if !list.open_add_form().await {
        return Err(format!("{} records are read-only", list.schema().title));
    }
    for (field, value) in assignments {
        if !list.set_form_value(field, value).await {
            return Err(format!("unknown field '{field}'"));
        }
    }
    let event = list.view().await.form.submit_event();
    match list.handle_event(event).await {
        EventOutcome::Create(outcome) => host
            .apply(&outcome)
            .map_err(|e| format!("failed to queue notification: {e}")),
        other => Err(format!("unexpected form outcome {other:?}")),
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    let storage = FileStore::open(&run.storage_path).map_err(|e| e.to_string())?;
    if let Some(token) = run.token.as_deref() {
        storage.set(TOKEN_KEY, token).map_err(|e| e.to_string())?;
        info!(path = %storage.path().display(), "auth token stored");
    }
    let session: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let host = SessionToastHost::new(session.clone());

    let api = Arc::new(
        ApiClient::new(ClientOptions {
            endpoint: run.endpoint.clone(),
            token: storage.get(TOKEN_KEY),
            timeout_seconds: run.timeout,
            proxy: run.proxy.clone(),
        })
        .map_err(|e| e.to_string())?,
    );
    let location = Arc::new(Mutex::new(run.location.clone()));

    format_kv_line("Endpoint", api.endpoint());
    format_kv_line("Patient", &run.patient_id);
    format_kv_line(
        "Lists",
        &run.entities
            .iter()
            .map(|e| e.schema().title)
            .collect::<Vec<_>>()
            .join(", "),
    );
    println!();

    let now = Instant::now();
    let pb = new_spinner()?;
    let mut lists = build_lists(&run.entities, &api, &location);
    load_all(&lists, run.page, &pb).await;

    if let Some(list) = lists.first().cloned().filter(|_| run.edit.is_some() || run.add) {
        let outcome = match run.edit {
            Some(record_id) => {
                pb.set_message(format!("editing record {record_id}"));
                run_edit(&list, record_id, &run.assignments, &host).await.map(|_| ())
            }
            None => {
                pb.set_message("adding record");
                run_add(&list, &run.assignments, &host).await
            }
        };
        if let Err(e) = outcome {
            pb.finish_and_clear();
            return Err(e);
        }
        if host.take_reload_request() {
            pb.set_message("reloading");
            lists = build_lists(&run.entities, &api, &location);
            load_all(&lists, run.page, &pb).await;
        }
    }
    pb.finish_and_clear();

    let toast = Toast::take(session.as_ref()).map_err(|e| e.to_string())?;
    if let Some(toast) = toast.as_ref() {
        print_toast(toast);
        println!();
    }

    let sections = collect_sections(&lists).await;
    let rendered = match run.output_format {
        OutputFormat::Text => output::render_text(&sections),
        OutputFormat::Json => output::render_json(&sections),
        OutputFormat::Html => output::render_html(&sections, &run.patient_id, toast.as_ref()),
    };

    match run.output.as_deref() {
        Some(path) => {
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await
                .map_err(|e| format!("failed to open output file: {e}"))?;
            outfile
                .write_all(&rendered)
                .await
                .map_err(|_| "failed to write output file".to_string())?;
            format_kv_line("Output", path);
        }
        None => print!("{}", String::from_utf8_lossy(&rendered)),
    }

    let loaded = sections.iter().filter(|s| s.current_page.is_some()).count();
    println!(
        ":: Completed :: {}/{} lists loaded in {}ms ::",
        loaded,
        sections.len(),
        now.elapsed().as_millis()
    );

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    if args.init_config {
        let path = user_config_path
            .or_else(config::default_config_path)
            .ok_or_else(|| "could not determine home directory for config".to_string())?;
        config::ensure_default_config_file(&path)?;
        format_kv_line("Config", &path.display().to_string());
        return Ok(());
    }

    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg, config::endpoint_from_env())?;
    info!(verbose = run.verbose, endpoint = %run.endpoint, "starting");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> CliArgs {
        let mut full = vec!["medhistory"];
        full.extend_from_slice(argv);
        CliArgs::parse_from(full)
    }

    #[test]
    fn defaults_load_every_list_as_text() {
        let run = build_run_config(args(&["-p", "42"]), ConfigFile::default(), None).unwrap();
        assert_eq!(run.entities, Entity::ALL.to_vec());
        assert_eq!(run.patient_id, "42");
        assert_eq!(run.endpoint, crate::api::DEFAULT_ENDPOINT);
        assert_eq!(run.output_format, OutputFormat::Text);
        assert_eq!(run.timeout, 10);
        assert!(run.location.url().as_str().starts_with("http://127.0.0.1:8000/patient/view?id=42"));
    }

    #[test]
    fn page_url_supplies_patient_and_edit_id() {
        let run = build_run_config(
            args(&["--page-url", "http://clinic.local/patient?id=9&edit_id=3", "-e", "social"]),
            ConfigFile::default(),
            None,
        )
        .unwrap();
        assert_eq!(run.patient_id, "9");
        assert_eq!(run.location.edit_id(), Some(RecordId(3)));
        assert_eq!(run.entities, vec![Entity::SocialHistory]);
    }

    #[test]
    fn missing_patient_is_rejected() {
        let err = build_run_config(args(&[]), ConfigFile::default(), None).unwrap_err();
        assert!(err.contains("patient"));
    }

    #[test]
    fn config_values_apply_below_flags() {
        let cfg = ConfigFile {
            endpoint: Some("http://cfg".to_string()),
            entities: Some(vec!["surgical".to_string(), "social".to_string()]),
            output: Some("report.html".to_string()),
            timeout: Some(3),
            ..ConfigFile::default()
        };
        let run = build_run_config(args(&["-p", "1"]), cfg.clone(), Some("http://env".to_string())).unwrap();
        assert_eq!(run.endpoint, "http://env");
        assert_eq!(run.entities, vec![Entity::SurgicalHistory, Entity::SocialHistory]);
        assert_eq!(run.output_format, OutputFormat::Html);
        assert_eq!(run.timeout, 3);

        let run = build_run_config(
            args(&["-p", "1", "--endpoint", "http://flag", "-e", "medication", "-A", "json"]),
            cfg,
            Some("http://env".to_string()),
        )
        .unwrap();
        assert_eq!(run.endpoint, "http://flag");
        assert_eq!(run.entities, vec![Entity::MedicationHistory]);
        assert_eq!(run.output_format, OutputFormat::Json);
    }

    #[test]
    fn edit_needs_one_editable_list_and_known_fields() {
        assert!(build_run_config(args(&["-p", "1", "--edit", "2"]), ConfigFile::default(), None).is_err());
        assert!(build_run_config(
            args(&["-p", "1", "-e", "vaccination", "--edit", "2"]),
            ConfigFile::default(),
            None
        )
        .is_err());
        assert!(build_run_config(
            args(&["-p", "1", "-e", "social", "--edit", "2", "-s", "blood_type=O"]),
            ConfigFile::default(),
            None
        )
        .is_err());

        let run = build_run_config(
            args(&["-p", "1", "-e", "social", "--edit", "2", "-s", "diet=keto"]),
            ConfigFile::default(),
            None,
        )
        .unwrap();
        assert_eq!(run.edit, Some(RecordId(2)));
        assert_eq!(run.assignments, vec![("diet".to_string(), "keto".to_string())]);
    }

    #[test]
    fn add_needs_one_editable_list() {
        let err = build_run_config(args(&["-p", "1", "--add"]), ConfigFile::default(), None).unwrap_err();
        assert!(err.contains("--add requires exactly one --entity"));

        let run = build_run_config(
            args(&["-p", "1", "-e", "surgical", "--add", "-s", "hospital=General"]),
            ConfigFile::default(),
            None,
        )
        .unwrap();
        assert!(run.add);
        assert_eq!(run.edit, None);
        assert_eq!(run.assignments, vec![("hospital".to_string(), "General".to_string())]);
    }

    #[test]
    fn help_lists_headings_and_aliases() {
        let help = render_custom_help();
        assert!(help.starts_with("medhistory"));
        assert!(help.contains("Patient:"));
        assert!(help.contains("--pid, --patient <ID>"));
        assert!(help.contains("-s, --set <FIELD=VALUE>"));
    }
}
