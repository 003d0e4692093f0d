use std::path::PathBuf;

use anyhow::{Context, bail};
use dms_core::SearchByMetadataRequest;
use dms_view::{
    BatchOperation, BreadcrumbEntry, DocumentId, Node, PresentationEvent, Relocation, ViewEvent,
    ViewHandle, ViewSnapshot,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

const HELP: &str = "\
commands:
  ls                     list the current folder
  pwd                    show the breadcrumb path
  cd <name>|..|/         change folder
  open <name>            enter a folder or download a file
  sel <name>...          toggle selection
  all | none             select or clear everything
  rm                     delete the selection
  mv <name>|..|/         move the selection
  cp <name>|..|/         copy the selection
  get                    download the selection
  put <path>...          upload local files into the current folder
  mkdir <name>           create a folder
  rename <name> <new>    rename an item
  search <name>          find documents by name
  refresh                reload the current folder
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Root,
    Parent,
    Named(String),
}

impl Location {
    fn parse(value: &str) -> Self {
        match value {
            "/" => Location::Root,
            ".." => Location::Parent,
            other => Location::Named(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    Pwd,
    Cd(Location),
    Open(String),
    Select(Vec<String>),
    SelectAll(bool),
    Delete,
    Move(Location),
    Copy(Location),
    Download,
    Upload(Vec<PathBuf>),
    Mkdir(String),
    Rename { from: String, to: String },
    Search(String),
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Done,
    Print(String),
    Quit,
}

/// Splits a line on whitespace; double quotes group words.
fn tokenize(line: &str) -> anyhow::Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if quoted {
        bail!("unterminated quote");
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

pub fn parse_command(line: &str) -> anyhow::Result<Option<ShellCommand>> {
    let tokens = tokenize(line)?;
    let Some((head, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let one = |what: &str| -> anyhow::Result<String> {
        match args {
            [value] => Ok(value.clone()),
            _ => bail!("{head} expects exactly one {what}"),
        }
    };
    let command = match head.as_str() {
        "ls" => ShellCommand::List,
        "pwd" => ShellCommand::Pwd,
        "cd" => ShellCommand::Cd(Location::parse(&one("folder")?)),
        "open" => ShellCommand::Open(one("name")?),
        "sel" if !args.is_empty() => ShellCommand::Select(args.to_vec()),
        "all" => ShellCommand::SelectAll(true),
        "none" => ShellCommand::SelectAll(false),
        "rm" => ShellCommand::Delete,
        "mv" => ShellCommand::Move(Location::parse(&one("destination")?)),
        "cp" => ShellCommand::Copy(Location::parse(&one("destination")?)),
        "get" => ShellCommand::Download,
        "put" if !args.is_empty() => {
            ShellCommand::Upload(args.iter().map(PathBuf::from).collect())
        }
        "mkdir" => ShellCommand::Mkdir(one("name")?),
        "rename" => match args {
            [from, to] => ShellCommand::Rename {
                from: from.clone(),
                to: to.clone(),
            },
            _ => bail!("rename expects <name> <new name>"),
        },
        "search" => ShellCommand::Search(one("name")?),
        "refresh" => ShellCommand::Refresh,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        "sel" | "put" => bail!("{head} expects at least one argument"),
        other => bail!("unknown command: {other} (try `help`)"),
    };
    Ok(Some(command))
}

fn find_node<'a>(snapshot: &'a ViewSnapshot, name: &str) -> anyhow::Result<&'a Node> {
    snapshot
        .find(name)
        .with_context(|| format!("no item named {name:?} in this folder"))
}

fn parent_entry(snapshot: &ViewSnapshot) -> BreadcrumbEntry {
    let crumbs = &snapshot.breadcrumbs;
    if crumbs.len() >= 2 {
        crumbs[crumbs.len() - 2].clone()
    } else {
        BreadcrumbEntry::ROOT
    }
}

/// Folder id a location refers to; `None` is the namespace root.
fn resolve_location(
    snapshot: &ViewSnapshot,
    location: &Location,
) -> anyhow::Result<Option<DocumentId>> {
    match location {
        Location::Root => Ok(None),
        Location::Parent => Ok(parent_entry(snapshot).id),
        Location::Named(name) => {
            let node = find_node(snapshot, name)?;
            if !node.is_folder() {
                bail!("{name:?} is not a folder");
            }
            Ok(Some(node.id))
        }
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn render_path(snapshot: &ViewSnapshot) -> String {
    let names: Vec<&str> = snapshot
        .breadcrumbs
        .iter()
        .map(|entry| entry.name.as_ref())
        .collect();
    names.join(" / ")
}

pub fn render_listing(snapshot: &ViewSnapshot) -> String {
    let mut out = render_path(snapshot);
    if snapshot.loading {
        out.push_str("  (loading)");
    }
    if snapshot.show_upload_zone() {
        out.push_str("\n  empty folder, add files with `put <path>`");
        return out;
    }
    for node in &snapshot.children {
        let mark = if node.selected { "[x]" } else { "[ ]" };
        let suffix = if node.is_folder() { "/" } else { "" };
        let size = node.size.map(format_size).unwrap_or_default();
        out.push_str(&format!(
            "\n  {mark} {:<18} {}{suffix}  {size}",
            node.icon.name(),
            node.name
        ));
    }
    out
}

pub struct Shell {
    handle: ViewHandle,
    allow_duplicate_names: bool,
}

impl Shell {
    pub fn new(handle: ViewHandle, allow_duplicate_names: bool) -> Self {
        Self {
            handle,
            allow_duplicate_names,
        }
    }

    fn relocation(&self, snapshot: &ViewSnapshot, location: &Location) -> anyhow::Result<Relocation> {
        Ok(Relocation {
            target: resolve_location(snapshot, location)?,
            allow_duplicate_names: self.allow_duplicate_names,
        })
    }

    pub async fn execute(&self, command: ShellCommand) -> anyhow::Result<Reply> {
        let snapshot = self.handle.snapshot();
        match command {
            ShellCommand::List => return Ok(Reply::Print(render_listing(&snapshot))),
            ShellCommand::Pwd => return Ok(Reply::Print(render_path(&snapshot))),
            ShellCommand::Cd(Location::Root) => self.handle.navigate(&BreadcrumbEntry::ROOT)?,
            ShellCommand::Cd(Location::Parent) => {
                self.handle.navigate(&parent_entry(&snapshot))?
            }
            ShellCommand::Cd(Location::Named(name)) => {
                let node = find_node(&snapshot, &name)?;
                if !node.is_folder() {
                    bail!("{name:?} is not a folder");
                }
                self.handle.dispatch(PresentationEvent::DoubleClick(node.id))?;
            }
            ShellCommand::Open(name) => {
                let node = find_node(&snapshot, &name)?;
                self.handle.dispatch(PresentationEvent::DoubleClick(node.id))?;
            }
            ShellCommand::Select(names) => {
                let ids = names
                    .iter()
                    .map(|name| find_node(&snapshot, name).map(|node| node.id))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                for id in ids {
                    self.handle.dispatch(PresentationEvent::Click(id))?;
                }
            }
            ShellCommand::SelectAll(selected) => self.handle.select_all(selected)?,
            ShellCommand::Delete => self.handle.execute_selected(BatchOperation::Delete)?,
            ShellCommand::Move(location) => {
                let relocation = self.relocation(&snapshot, &location)?;
                self.handle
                    .execute_selected(BatchOperation::Move(relocation))?;
            }
            ShellCommand::Copy(location) => {
                let relocation = self.relocation(&snapshot, &location)?;
                self.handle
                    .execute_selected(BatchOperation::Copy(relocation))?;
            }
            ShellCommand::Download => self.handle.execute_selected(BatchOperation::Download)?,
            ShellCommand::Upload(files) => {
                if let Some(missing) = files.iter().find(|path| !path.is_file()) {
                    bail!("{} is not a readable file", missing.display());
                }
                self.handle.dispatch(PresentationEvent::Drop(files))?;
            }
            ShellCommand::Mkdir(name) => self.handle.create_folder(name)?,
            ShellCommand::Rename { from, to } => {
                let node = find_node(&snapshot, &from)?;
                self.handle.rename(node.id, to)?;
            }
            ShellCommand::Search(name) => {
                let hits = self
                    .handle
                    .search(SearchByMetadataRequest {
                        name: Some(name),
                        ..SearchByMetadataRequest::default()
                    })
                    .await?;
                return Ok(Reply::Print(render_hits(&snapshot, &hits)));
            }
            ShellCommand::Refresh => self.handle.request_refresh()?,
            ShellCommand::Help => return Ok(Reply::Print(HELP.to_string())),
            ShellCommand::Quit => return Ok(Reply::Quit),
        }
        Ok(Reply::Done)
    }
}

fn render_hits(snapshot: &ViewSnapshot, hits: &[DocumentId]) -> String {
    if hits.is_empty() {
        return "no matches".to_string();
    }
    hits.iter()
        .map(|id| {
            match snapshot.children.iter().find(|node| node.id == *id) {
                Some(node) => format!("{id}  {}", node.name),
                None => id.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints notifications, and the listing after every applied load.
async fn print_events(
    mut events: mpsc::UnboundedReceiver<ViewEvent>,
    mut snapshots: watch::Receiver<ViewSnapshot>,
) {
    while let Some(event) = events.recv().await {
        if let ViewEvent::FolderLoaded { generation, .. } = event {
            match snapshots.wait_for(|snapshot| snapshot.generation >= generation).await {
                Ok(snapshot) => println!("{}", render_listing(&snapshot)),
                Err(_) => break,
            }
            continue;
        }
        if let Some(message) = event.notification() {
            println!("{message}");
        }
    }
}

pub async fn run(
    handle: ViewHandle,
    events: mpsc::UnboundedReceiver<ViewEvent>,
    start: Option<DocumentId>,
    allow_duplicate_names: bool,
) -> anyhow::Result<()> {
    let printer = tokio::spawn(print_events(events, handle.subscribe()));
    handle.load_folder(start)?;

    let shell = Shell::new(handle, allow_duplicate_names);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read command")? {
        let reply = match parse_command(&line) {
            Ok(Some(command)) => shell.execute(command).await,
            Ok(None) => Ok(Reply::Done),
            Err(err) => Err(err),
        };
        match reply {
            Ok(Reply::Print(text)) => println!("{text}"),
            Ok(Reply::Quit) => break,
            Ok(Reply::Done) => {}
            Err(err) => eprintln!("error: {err:#}"),
        }
    }

    drop(shell);
    printer.await.context("event printer panicked")?;
    Ok(())
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
