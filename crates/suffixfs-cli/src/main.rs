//! suffixfs - browse a directory tree with filetype suffixes hidden.
//!
//! Usage:
//!   # List a directory as a client would see it
//!   suffixfs --root /srv/econet ls Apps
//!
//!   # Which file on disk does a logical name open?
//!   suffixfs --root /srv/econet resolve Apps/!Edit
//!
//!   # Settings from a file, with per-lookup logging
//!   suffixfs --config suffixfs.toml --debug cat Library/photo

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use suffixfs_kernel::{
    Ino, LocalBackend, NodeOps, Passthrough, ROOT_INO, Request, SuffixFs, SuffixFsConfig,
    TieBreak, vfs::collect_entries,
};

type View = SuffixFs<Passthrough<LocalBackend>>;

/// Read size for `cat`.
const CHUNK: u32 = 64 * 1024;

/// Suffix-transparent view of a directory tree.
#[derive(Parser, Debug)]
#[command(name = "suffixfs")]
#[command(about = "Browse a directory tree with RISC OS filetype suffixes hidden")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backing directory (overrides the settings file)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Log every name mapping
    #[arg(short, long)]
    debug: bool,

    /// Which physical name wins when several strip to the same name
    #[arg(long)]
    tie_break: Option<TieBreak>,

    /// Refuse writes to the backing directory
    #[arg(long)]
    read_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory's logical names
    Ls { path: Option<PathBuf> },
    /// Show the physical path a logical path maps to
    Resolve { path: PathBuf },
    /// Show attributes
    Stat { path: PathBuf },
    /// Write file contents to stdout
    Cat { path: PathBuf },
    /// List extended attributes, or print one
    Xattr { path: PathBuf, name: Option<String> },
    /// Show backing filesystem usage
    Df,
}

impl Args {
    async fn config(&self) -> Result<SuffixFsConfig> {
        let mut config = match &self.config {
            Some(path) => SuffixFsConfig::load(path)
                .await
                .with_context(|| format!("loading {}", path.display()))?,
            None => SuffixFsConfig::default(),
        };

        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(tie_break) = self.tie_break {
            config.tie_break = tie_break;
        }
        config.debug |= self.debug;
        config.read_only |= self.read_only;

        config.validate().context("invalid configuration")
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Names along a logical path. `..` is kept so the lookup rejects it.
fn components(path: &Path) -> impl Iterator<Item = &OsStr> {
    path.components().filter_map(|part| match part {
        Component::Normal(name) => Some(name),
        Component::ParentDir => Some(OsStr::new("..")),
        Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
    })
}

/// Look up each component of a logical path from the root.
async fn walk(fs: &View, req: &Request, path: &Path) -> Result<Ino> {
    let mut ino = ROOT_INO;
    for name in components(path) {
        ino = fs
            .lookup(req, ino, name)
            .await
            .with_context(|| format!("{}: cannot find {name:?}", path.display()))?
            .ino;
    }
    Ok(ino)
}

/// Split a logical path into its directory inode and final name.
async fn walk_parent<'a>(fs: &View, req: &Request, path: &'a Path) -> Result<(Ino, &'a OsStr)> {
    let parts: Vec<&OsStr> = components(path).collect();
    let Some((last, dirs)) = parts.split_last() else {
        bail!("{} names the root", path.display());
    };
    let parent = walk(fs, req, &dirs.iter().collect::<PathBuf>()).await?;
    Ok((parent, *last))
}

async fn run(fs: &View, req: Request, command: Command) -> Result<()> {
    let req = &req;
    let mut out = tokio::io::stdout();

    match command {
        Command::Ls { path } => {
            let ino = walk(fs, req, &path.unwrap_or_default()).await?;
            let mut stream = fs.opendir(req, ino).await?;
            for entry in collect_entries(stream.as_mut())? {
                out.write_all(entry.name.as_bytes()).await?;
                let end: &[u8] = if entry.kind.is_dir() { b"/\n" } else { b"\n" };
                out.write_all(end).await?;
            }
        }
        Command::Resolve { path } => {
            let (parent, name) = walk_parent(fs, req, &path).await?;
            let resolution = fs.resolve(req, parent, name).await?;
            let dir = match fs.delegate().real_path(parent).await? {
                Some(host) => host,
                None => fs.node_path(parent)?,
            };
            let physical = dir.join(resolution.name());
            out.write_all(physical.as_os_str().as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        Command::Stat { path } => {
            let ino = walk(fs, req, &path).await?;
            let attr = fs.getattr(req, ino).await?;
            let physical = fs.node_path(ino)?;
            let host = fs.delegate().real_path(ino).await?.unwrap_or_default();
            let text = format!(
                "path: {}\nhost: {}\nkind: {:?}\nsize: {}\nperm: {:o}\nnlink: {}\n",
                display(&physical),
                display(&host),
                attr.kind,
                attr.size,
                attr.perm,
                attr.nlink
            );
            out.write_all(text.as_bytes()).await?;
        }
        Command::Cat { path } => {
            let ino = walk(fs, req, &path).await?;
            let mut offset = 0u64;
            loop {
                let chunk = fs.read(req, ino, offset, CHUNK).await?;
                if chunk.is_empty() {
                    break;
                }
                offset += chunk.len() as u64;
                out.write_all(&chunk).await?;
            }
        }
        Command::Xattr { path, name } => {
            let ino = walk(fs, req, &path).await?;
            match name {
                Some(name) => {
                    let value = fs
                        .getxattr(req, ino, &name)
                        .await
                        .with_context(|| format!("{}: {name}", path.display()))?;
                    out.write_all(&value).await?;
                    out.write_all(b"\n").await?;
                }
                None => {
                    for name in fs.listxattr(req, ino).await? {
                        out.write_all(format!("{name}\n").as_bytes()).await?;
                    }
                }
            }
        }
        Command::Df => {
            let stat = fs.statfs(req).await?;
            let text = format!(
                "bsize: {}\nblocks: {}\nfree: {}\navail: {}\nfiles: {}\nnamelen: {}\nread-only: {}\n",
                stat.bsize,
                stat.blocks,
                stat.bfree,
                stat.bavail,
                stat.files,
                stat.namelen,
                fs.store().read_only()
            );
            out.write_all(text.as_bytes()).await?;
        }
    }

    out.flush().await?;
    Ok(())
}

fn display(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_string()
    } else {
        path.display().to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config().await?;
    init_tracing(config.debug);

    tracing::debug!(?config, "starting");
    let fs = SuffixFs::from_config(&config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            on_interrupt.cancel();
        }
    });

    run(&fs, Request::with_cancel(1, cancel), args.command).await
}
