//! Report subscribers: tab-separated tables, JSONL event logs and an
//! in-memory collector.

use imex_kernel::{Event, OutcomeKind};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::notifier::{Subscriber, SubscriberError};

pub const REPORT_COLUMNS: [&str; 5] = [
    "Publication id",
    "Imex id",
    "Interaction ac(s)",
    "Outcome",
    "Message",
];

pub const ALL_REPORT_FILE: &str = "all.tsv";

/// Per-outcome report file. Planned outcomes only appear in `all.tsv`.
pub fn report_file_name(kind: OutcomeKind) -> Option<&'static str> {
    match kind {
        OutcomeKind::Assigned => Some("assigned.tsv"),
        OutcomeKind::UpToDate => Some("up_to_date.tsv"),
        OutcomeKind::Conflict => Some("conflicts.tsv"),
        OutcomeKind::Ineligible => Some("ineligible.tsv"),
        OutcomeKind::RegisteredElsewhere => Some("registered_elsewhere.tsv"),
        OutcomeKind::Error => Some("errors.tsv"),
        OutcomeKind::Planned => None,
    }
}

fn cell(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "-".to_string();
    }
    value.replace(['\t', '\n', '\r'], " ")
}

pub fn render_header() -> String {
    REPORT_COLUMNS.join("\t")
}

pub fn render_row(event: &Event) -> String {
    let imex_id = event
        .imex_id
        .map(|id| id.to_string())
        .unwrap_or_default();
    [
        cell(&event.publication_id),
        cell(&imex_id),
        cell(&event.interaction_acs.join(", ")),
        event.kind().as_str().to_string(),
        cell(&event.message),
    ]
    .join("\t")
}

/// One tab-separated row per event, header written on construction.
pub struct TabularReport<W: Write> {
    name: String,
    writer: W,
    rows: u64,
}

impl<W: Write> TabularReport<W> {
    pub fn new(writer: W) -> Result<Self, SubscriberError> {
        Self::named("tabular-report", writer)
    }

    pub fn named(name: impl Into<String>, mut writer: W) -> Result<Self, SubscriberError> {
        writeln!(writer, "{}", render_header())?;
        Ok(Self {
            name: name.into(),
            writer,
            rows: 0,
        })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Subscriber for TabularReport<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&mut self, event: &Event) -> Result<(), SubscriberError> {
        writeln!(self.writer, "{}", render_row(event))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SubscriberError> {
        self.writer.flush()?;
        Ok(())
    }
}

type FileReport = TabularReport<BufWriter<File>>;

fn create_report(path: &Path) -> Result<FileReport, SubscriberError> {
    let file = File::create(path)?;
    TabularReport::named(path.display().to_string(), BufWriter::new(file))
}

/// A directory of per-outcome tables plus `all.tsv`.
///
/// Every file exists with its header as soon as the directory is opened, so
/// a run that produces no events still leaves a complete report.
pub struct ReportDirectory {
    dir: PathBuf,
    all: FileReport,
    by_kind: BTreeMap<OutcomeKind, FileReport>,
}

impl ReportDirectory {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SubscriberError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let all = create_report(&dir.join(ALL_REPORT_FILE))?;
        let mut by_kind = BTreeMap::new();
        for kind in OutcomeKind::ALL {
            if let Some(file_name) = report_file_name(kind) {
                by_kind.insert(kind, create_report(&dir.join(file_name))?);
            }
        }
        Ok(Self { dir, all, by_kind })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Subscriber for ReportDirectory {
    fn name(&self) -> &str {
        "report-directory"
    }

    fn on_event(&mut self, event: &Event) -> Result<(), SubscriberError> {
        self.all.on_event(event)?;
        if let Some(report) = self.by_kind.get_mut(&event.kind()) {
            report.on_event(event)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SubscriberError> {
        self.all.finish()?;
        for report in self.by_kind.values_mut() {
            report.finish()?;
        }
        Ok(())
    }
}

/// JSONL stream of serialized events.
pub struct EventLog<W: Write> {
    writer: W,
}

impl<W: Write> EventLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl EventLog<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SubscriberError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> Subscriber for EventLog<W> {
    fn name(&self) -> &str {
        "event-log"
    }

    fn on_event(&mut self, event: &Event) -> Result<(), SubscriberError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SubscriberError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl Subscriber for EventCollector {
    fn name(&self) -> &str {
        "event-collector"
    }

    fn on_event(&mut self, event: &Event) -> Result<(), SubscriberError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
