use crate::aggregate::DaySummary;
use crate::api::{ApiClient, UploadSource};
use crate::helpers::date::format_check_date;
use crate::helpers::file::{display_name, document_path, key_from_file_name};
use crate::model::{
    CheckPhase, CheckProgress, CheckRequest, ClientConfig, DayResult, FileKind,
    ModuleSelection, PollEvent, UploadedFile,
};
use crate::orchestrator::{
    process_check_completion, process_vgc_completion, watch_check, OutputTargets,
    WatchSettings, WatchTarget,
};
use crate::session::{Session, Store};
use crate::text_summary::{build_day_summary, build_vgc_list, progress_line};
use crate::validation::{
    document_keys, required_kinds, validate, validate_vgc_creation, vgc_creation_keys,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

/// Handle for queueing output lines.
#[derive(Clone)]
struct Output {
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl Output {
    fn line(&self, msg: impl Into<String>) {
        let _ = self.tx.send(OutputLine::Stdout(msg.into()));
    }

    fn info(&self, msg: impl Into<String>) {
        let _ = self.tx.send(OutputLine::Stderr(msg.into()));
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.line(serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "kdv-checks",
    version,
    about = "Upload childcare planning documents and run BKR / VGC / 3-UURS compliance checks"
)]
pub struct Cli {
    /// Base URL of the compliance backend API
    #[arg(long, env = "KDV_API_BASE_URL", default_value = "http://localhost:8000/api", global = true)]
    pub base_url: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the session file and saved results
    #[arg(long, env = "KDV_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Per-request timeout
    #[arg(long, default_value = "30s", global = true)]
    pub timeout: humantime::Duration,

    /// Delay between progress polls when watching
    #[arg(long, default_value = "2s", global = true)]
    pub poll_interval: humantime::Duration,

    /// Stop watching after this long
    #[arg(long, default_value = "10m", global = true)]
    pub poll_timeout: humantime::Duration,

    /// Export the finished result as JSON
    #[arg(long, global = true)]
    pub export_json: Option<PathBuf>,

    /// Export the finished result as CSV
    #[arg(long, global = true)]
    pub export_csv: Option<PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, global = true)]
    pub auto_save: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Upload one or more documents of one kind
    Upload {
        kind: KindArg,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Manage the documents selected for the next check
    Files {
        #[command(subcommand)]
        action: FilesCommand,
    },
    /// List documents the backend already holds for the selected modules
    Requirements {
        #[command(flatten)]
        modules: ModuleArgs,
    },
    /// Start, watch and list compliance checks
    Check {
        #[command(subcommand)]
        action: CheckCommand,
    },
    /// Generate a VGC list from planning and registration documents
    Vgc {
        #[command(subcommand)]
        action: VgcCommand,
    },
    /// Summarize a saved check result
    Show { path: PathBuf },
}

#[derive(Debug, Subcommand, Clone)]
pub enum FilesCommand {
    /// Show selected documents per kind
    List { kind: Option<KindArg> },
    /// Select a stored document (name as listed by `requirements`)
    Add { kind: KindArg, stored_name: String },
    /// Delete a document on the backend and drop it from the selection
    Remove {
        key: String,
        #[arg(long)]
        kind: Option<KindArg>,
        /// Only drop it from the selection
        #[arg(long)]
        local_only: bool,
    },
    /// Processing status of a document
    Status { key: String },
    /// Download a document
    Download {
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Drop every document from the selection
    Clear,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CheckCommand {
    /// Submit a check for the selected documents
    Start {
        /// Check date (YYYY-MM-DD or DD-MM-YYYY)
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        modules: ModuleArgs,
        #[arg(long, default_value = "flexkids")]
        source: String,
        /// Poll until the check finishes
        #[arg(long)]
        watch: bool,
    },
    /// Show progress or result of a check (defaults to the last one started)
    Progress {
        id: Option<String>,
        #[arg(long)]
        watch: bool,
    },
    /// List known check ids
    List,
}

#[derive(Debug, Subcommand, Clone)]
pub enum VgcCommand {
    /// Start generating a VGC list
    Create {
        #[arg(long)]
        watch: bool,
    },
    /// Show progress or the generated list
    Progress {
        id: String,
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Debug, Args, Clone, Copy)]
pub struct ModuleArgs {
    /// Enable the VGC (fixed faces) module
    #[arg(long)]
    pub vgc: bool,
    /// Enable the 3-UURS module
    #[arg(long)]
    pub three_hours: bool,
}

impl From<ModuleArgs> for ModuleSelection {
    fn from(m: ModuleArgs) -> Self {
        ModuleSelection {
            vgc: m.vgc,
            three_hours: m.three_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    StaffPlanning,
    ChildPlanning,
    ChildRegistration,
    #[value(alias = "fixed-faces")]
    VgcList,
}

impl From<KindArg> for FileKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::StaffPlanning => FileKind::StaffPlanning,
            KindArg::ChildPlanning => FileKind::ChildPlanning,
            KindArg::ChildRegistration => FileKind::ChildRegistration,
            KindArg::VgcList => FileKind::VgcList,
        }
    }
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.base_url.clone(),
        request_timeout: Duration::from(args.timeout),
        poll_interval: Duration::from(args.poll_interval),
        poll_timeout: Duration::from(args.poll_timeout),
        user_agent: format!("kdv-checks/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// State shared by command handlers.
struct Ctx {
    args: Cli,
    cfg: ClientConfig,
    client: ApiClient,
    store: Store,
    out: Output,
}

impl Ctx {
    fn targets(&self) -> OutputTargets {
        OutputTargets {
            auto_save: self.args.auto_save,
            export_json: self.args.export_json.clone(),
            export_csv: self.args.export_csv.clone(),
        }
    }

    fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            interval: self.cfg.poll_interval,
            timeout: self.cfg.poll_timeout,
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let (tx, handle) = spawn_output_writer();
    let res = dispatch(args, Output { tx }).await;
    let _ = handle.await;
    res
}

async fn dispatch(args: Cli, out: Output) -> Result<()> {
    let cfg = build_config(&args);
    let client = ApiClient::new(&cfg)?;
    let store = Store::new(args.state_dir.clone())?;
    tracing::debug!(base_url = %client.base_url(), state = %store.dir().display(), "starting");
    let command = args.command.clone();
    let ctx = Ctx {
        args,
        cfg,
        client,
        store,
        out,
    };

    match command {
        Command::Upload { kind, files } => upload(&ctx, kind.into(), files).await,
        Command::Files { action } => files(&ctx, action).await,
        Command::Requirements { modules } => requirements(&ctx, modules.into()).await,
        Command::Check { action } => match action {
            CheckCommand::Start {
                date,
                modules,
                source,
                watch,
            } => start_check(&ctx, date, modules.into(), source, watch).await,
            CheckCommand::Progress { id, watch } => check_progress(&ctx, id, watch).await,
            CheckCommand::List => list_checks(&ctx).await,
        },
        Command::Vgc { action } => match action {
            VgcCommand::Create { watch } => create_vgc_list(&ctx, watch).await,
            VgcCommand::Progress { id, watch } => vgc_progress(&ctx, &id, watch).await,
        },
        Command::Show { path } => show(&ctx, &path),
    }
}

async fn upload(ctx: &Ctx, kind: FileKind, paths: Vec<PathBuf>) -> Result<()> {
    let mut sources = Vec::new();
    let mut failed: Vec<(PathBuf, String)> = Vec::new();
    for path in paths {
        match UploadSource::read(&path, kind).await {
            Ok(s) => sources.push(s),
            Err(e) => failed.push((path, format!("{e:#}"))),
        }
    }

    let results = ctx.client.upload_files(sources, kind).await;
    let mut session = ctx.store.load()?;
    let mut uploaded: Vec<(PathBuf, UploadedFile)> = Vec::new();
    for (path, res) in results {
        match res {
            Ok(file) => {
                session.add_file(kind, file.clone());
                uploaded.push((path, file));
            }
            Err(e) => failed.push((path, e.to_string())),
        }
    }
    ctx.store.save(&session)?;

    if uploaded.is_empty() {
        let reasons: Vec<String> = failed
            .iter()
            .map(|(path, err)| format!("Upload failed for {}: {err}", path.display()))
            .collect();
        bail!("{}", reasons.join("; "));
    }

    if ctx.args.json {
        ctx.out.json(&json!({
            "kind": kind,
            "uploaded": uploaded.iter().map(|(p, f)| json!({
                "path": p, "objectKey": f.object_key, "fileUrl": f.file_url,
            })).collect::<Vec<_>>(),
            "failed": failed.iter().map(|(p, e)| json!({ "path": p, "error": e })).collect::<Vec<_>>(),
        }))?;
    } else {
        for (path, file) in &uploaded {
            ctx.out
                .line(format!("Uploaded {} -> {}", path.display(), file.object_key));
        }
        for (path, err) in &failed {
            ctx.out
                .info(format!("Upload failed for {}: {err}", path.display()));
        }
    }
    Ok(())
}

fn print_files(ctx: &Ctx, session: &Session, kinds: &[FileKind]) -> Result<()> {
    if ctx.args.json {
        let map: serde_json::Map<String, serde_json::Value> = kinds
            .iter()
            .map(|k| -> Result<(String, serde_json::Value)> {
                Ok((k.as_str().to_string(), serde_json::to_value(session.files(*k))?))
            })
            .collect::<Result<_>>()?;
        return ctx.out.json(&map);
    }
    for kind in kinds {
        ctx.out.line(format!("{}:", kind.title()));
        let files = session.files(*kind);
        if files.is_empty() {
            ctx.out.line("  No files uploaded yet.");
        }
        for f in files {
            match f.file_url.as_deref() {
                Some(url) => ctx.out.line(format!("  {}  {}", f.object_key, url)),
                None => ctx.out.line(format!("  {}", f.object_key)),
            }
        }
    }
    Ok(())
}

async fn files(ctx: &Ctx, action: FilesCommand) -> Result<()> {
    match action {
        FilesCommand::List { kind } => {
            let session = ctx.store.load()?;
            let kinds: Vec<FileKind> = match kind {
                Some(k) => vec![k.into()],
                None => FileKind::ALL.to_vec(),
            };
            print_files(ctx, &session, &kinds)
        }
        FilesCommand::Add { kind, stored_name } => {
            let kind: FileKind = kind.into();
            let key = key_from_file_name(&stored_name)
                .with_context(|| format!("{stored_name:?} does not carry an object key"))?
                .to_string();
            let mut session = ctx.store.load()?;
            let added = session.add_file(
                kind,
                UploadedFile {
                    object_key: key.clone(),
                    file_url: Some(document_path(kind, &stored_name)),
                },
            );
            ctx.store.save(&session)?;
            if added {
                ctx.out.line(format!("Added {key} to {kind}"));
            } else {
                ctx.out.info(format!("{key} is already selected for {kind}"));
            }
            Ok(())
        }
        FilesCommand::Remove {
            key,
            kind,
            local_only,
        } => {
            let mut session = ctx.store.load()?;
            let kind: Option<FileKind> = kind.map(Into::into).or_else(|| session.kind_of(&key));
            if !local_only {
                ctx.client
                    .remove_file(&key)
                    .await
                    .context("Failed to remove file")?;
            }
            let removed = kind.is_some_and(|k| session.remove_file(k, &key));
            ctx.store.save(&session)?;
            if removed || !local_only {
                ctx.out.line(format!("Removed {key}"));
            } else {
                ctx.out.info(format!("{key} was not selected"));
            }
            Ok(())
        }
        FilesCommand::Status { key } => {
            let payload = ctx
                .client
                .file_status(&key)
                .await
                .context("Failed to get file status")?;
            if ctx.args.json {
                ctx.out.json(&payload.into_json())
            } else {
                ctx.out.line(payload.render());
                Ok(())
            }
        }
        FilesCommand::Download { key, output } => {
            let body = ctx
                .client
                .download_file(&key)
                .await
                .context("Failed to download file")?;
            let path = output.unwrap_or_else(|| PathBuf::from(&key));
            std::fs::write(&path, &body).with_context(|| format!("write {}", path.display()))?;
            ctx.out
                .info(format!("Saved {} bytes to {}", body.len(), path.display()));
            Ok(())
        }
        FilesCommand::Clear => {
            let mut session = ctx.store.load()?;
            session.clear();
            ctx.store.save(&session)?;
            ctx.out.info("Selection cleared");
            Ok(())
        }
    }
}

async fn requirements(ctx: &Ctx, modules: ModuleSelection) -> Result<()> {
    let req = ctx.client.requirements(modules).await?;
    if ctx.args.json {
        return ctx.out.json(&req);
    }
    let session = ctx.store.load()?;
    for kind in required_kinds(modules) {
        ctx.out.line(format!("{}:", kind.title()));
        let docs = req.documents(kind);
        if docs.is_empty() {
            ctx.out.line("  No documentations");
        }
        for doc in docs {
            let key = key_from_file_name(&doc).unwrap_or("-");
            let selected = session.files(kind).iter().any(|f| f.object_key == key);
            ctx.out.line(format!(
                "  {} {key}  {}",
                if selected { "*" } else { " " },
                display_name(&doc)
            ));
        }
    }
    Ok(())
}

async fn start_check(
    ctx: &Ctx,
    date: Option<String>,
    modules: ModuleSelection,
    source: String,
    watch_flag: bool,
) -> Result<()> {
    let mut session = ctx.store.load()?;
    let validation = validate(&session, modules, date.as_deref());
    if !validation.can_start {
        bail!(validation.message());
    }
    let raw_date = date.unwrap_or_default();
    let date = format_check_date(&raw_date)
        .with_context(|| format!("invalid check date {raw_date:?}"))?;

    let request = CheckRequest {
        date,
        modules: modules.modules(),
        document_keys: document_keys(&session, modules),
        source,
    };
    let names: Vec<&str> = request.modules.iter().map(|m| m.as_check_str()).collect();
    tracing::info!(
        date = %request.date,
        modules = %names.join(","),
        keys = request.document_keys.len(),
        "starting check"
    );
    let check_id = ctx
        .client
        .start_check(&request)
        .await
        .context("Failed to start check")?;
    session.record_check(&check_id);
    ctx.store.save(&session)?;

    if !watch_flag {
        if ctx.args.json {
            return ctx.out.json(&json!({ "checkId": check_id }));
        }
        ctx.out.line(format!("Last Check ID: {check_id}"));
        return Ok(());
    }
    ctx.out.info(format!("Started check {check_id}"));
    let progress = watch(ctx, WatchTarget::Check, &check_id).await?;
    report_check(ctx, &check_id, &progress)
}

fn resolve_check_id(ctx: &Ctx, id: Option<String>) -> Result<String> {
    if let Some(id) = id.filter(|i| !i.trim().is_empty()) {
        return Ok(id);
    }
    ctx.store
        .load()?
        .check_ids
        .last()
        .cloned()
        .context("Please enter a check id.")
}

async fn watch(ctx: &Ctx, target: WatchTarget, check_id: &str) -> Result<CheckProgress> {
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<PollEvent>();
    let out = ctx.out.clone();
    let quiet = ctx.args.json;
    let printer = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            match ev {
                PollEvent::Finished { .. } => {}
                other if !quiet => out.info(other.to_message()),
                _ => {}
            }
        }
    });
    let res = watch_check(&ctx.client, target, check_id, ctx.watch_settings(), evt_tx).await;
    let _ = printer.await;
    res
}

async fn check_progress(ctx: &Ctx, id: Option<String>, watch_flag: bool) -> Result<()> {
    let check_id = resolve_check_id(ctx, id)?;
    let progress = if watch_flag {
        watch(ctx, WatchTarget::Check, &check_id).await?
    } else {
        ctx.client
            .check_progress(&check_id)
            .await
            .context("Failed to get progress")?
    };
    let mut session = ctx.store.load()?;
    session.record_check(&check_id);
    ctx.store.save(&session)?;
    report_check(ctx, &check_id, &progress)
}

fn print_days(ctx: &Ctx, days: &[(DayResult, DaySummary)]) {
    if days.is_empty() {
        ctx.out.line("No data available");
    }
    for (i, (day, summary)) in days.iter().enumerate() {
        if i > 0 {
            ctx.out.line("");
        }
        for line in build_day_summary(day, summary).lines {
            ctx.out.line(line);
        }
    }
}

fn report_check(ctx: &Ctx, check_id: &str, progress: &CheckProgress) -> Result<()> {
    match progress.phase() {
        CheckPhase::Completed => {
            let processed = process_check_completion(&ctx.targets(), &ctx.store, check_id, progress);
            if ctx.args.json {
                let summaries: Vec<&DaySummary> = processed.days.iter().map(|(_, s)| s).collect();
                ctx.out.json(&json!({
                    "checkId": check_id,
                    "status": progress.status,
                    "result": progress.result,
                    "summaries": summaries,
                }))?;
            } else {
                ctx.out.info(progress_line(check_id, progress));
                print_days(ctx, &processed.days);
            }
            for msg in processed.export_messages {
                ctx.out.info(msg);
            }
            if let Some(p) = processed.auto_saved_path {
                ctx.out.info(format!("Saved: {}", p.display()));
            }
            Ok(())
        }
        CheckPhase::Failed => bail!("check {check_id} failed: {}", progress.status.message),
        CheckPhase::Queued | CheckPhase::Running => {
            if ctx.args.json {
                ctx.out.json(&json!({ "checkId": check_id, "status": progress.status }))
            } else {
                ctx.out.line(progress_line(check_id, progress));
                Ok(())
            }
        }
    }
}

async fn list_checks(ctx: &Ctx) -> Result<()> {
    let mut session = ctx.store.load()?;
    match ctx.client.list_checks().await {
        Ok(ids) => {
            session.merge_check_ids(ids);
            ctx.store.save(&session)?;
        }
        Err(e) if e.status() == Some(404) => {
            tracing::debug!("backend does not list checks");
        }
        Err(e) => {
            tracing::warn!("listing checks failed: {e}");
            ctx.out.info(format!("Could not fetch check ids: {e}"));
        }
    }
    if ctx.args.json {
        return ctx.out.json(&session.check_ids);
    }
    for id in &session.check_ids {
        ctx.out.line(id.clone());
    }
    Ok(())
}

async fn create_vgc_list(ctx: &Ctx, watch_flag: bool) -> Result<()> {
    let mut session = ctx.store.load()?;
    let validation = validate_vgc_creation(&session);
    if !validation.can_start {
        bail!(validation.message());
    }
    let check_id = ctx
        .client
        .start_vgc_list(vgc_creation_keys(&session))
        .await
        .context("VGC list creation failed")?;
    session.record_check(&check_id);
    ctx.store.save(&session)?;
    if !watch_flag {
        if ctx.args.json {
            return ctx.out.json(&json!({ "checkId": check_id }));
        }
        ctx.out.line(format!("VGC list check ID: {check_id}"));
        return Ok(());
    }
    let progress = watch(ctx, WatchTarget::VgcList, &check_id).await?;
    report_vgc(ctx, &check_id, &progress)
}

async fn vgc_progress(ctx: &Ctx, check_id: &str, watch_flag: bool) -> Result<()> {
    let progress = if watch_flag {
        watch(ctx, WatchTarget::VgcList, check_id).await?
    } else {
        ctx.client
            .vgc_list_progress(check_id)
            .await
            .context("Failed to get progress")?
    };
    report_vgc(ctx, check_id, &progress)
}

fn report_vgc(ctx: &Ctx, check_id: &str, progress: &CheckProgress) -> Result<()> {
    let phase = progress.phase();
    if phase == CheckPhase::Failed {
        bail!("VGC list {check_id} failed: {}", progress.status.message);
    }
    if phase != CheckPhase::Completed || progress.result.is_none() {
        if ctx.args.json {
            return ctx.out.json(&json!({ "checkId": check_id, "status": progress.status }));
        }
        ctx.out.line(progress_line(check_id, progress));
        return Ok(());
    }

    let (messages, saved) = process_vgc_completion(&ctx.targets(), &ctx.store, check_id, progress);
    if ctx.args.json {
        ctx.out.json(&progress.result)?;
    } else if let Some(list) = progress.result.as_ref() {
        for line in build_vgc_list(list).lines {
            ctx.out.line(line);
        }
    }
    for msg in messages {
        ctx.out.info(msg);
    }
    if let Some(p) = saved {
        ctx.out.info(format!("Saved: {}", p.display()));
    }
    Ok(())
}

fn show(ctx: &Ctx, path: &std::path::Path) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&data).with_context(|| format!("parse {}", path.display()))?;
    // Saved results carry `status`; exported ones are the bare result array.
    let progress = if value.get("status").is_some() {
        serde_json::from_value::<CheckProgress>(value)?
    } else {
        CheckProgress {
            result: Some(value),
            ..Default::default()
        }
    };

    let targets = OutputTargets {
        auto_save: false,
        ..ctx.targets()
    };
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("result");
    let processed = process_check_completion(&targets, &ctx.store, name, &progress);
    if ctx.args.json {
        let summaries: Vec<&DaySummary> = processed.days.iter().map(|(_, s)| s).collect();
        ctx.out.json(&summaries)?;
    } else {
        print_days(ctx, &processed.days);
    }
    for msg in processed.export_messages {
        ctx.out.info(msg);
    }
    Ok(())
}
