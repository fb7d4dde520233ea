//! Site building orchestration.
//!
//! Every file under the content roots becomes one concurrent task: markdown
//! documents are rendered through their layout, everything else is copied.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── collect_sources()  ──► walk every content root
//!     │
//!     ├── read_headers()     ──► headers only, all documents at once
//!     │
//!     ├── root context       ──► built-ins, [base], [metadata],
//!     │                          tagList + rootCategory of published documents
//!     ├── load_layouts()     ──► <templates>/**/*.html, parsed once
//!     │
//!     └── JoinSet            ──► render_document() / copy_asset()
//!                                first failure cancels the rest
//! ```

use crate::{
    aggregate::{aggregate_categories, aggregate_tags},
    builtins::{self, DEFAULT_LAYOUT, ENTRY_KEY, SiteInfo},
    config::SiteConfig,
    dirs::DirectoryCreator,
    entry::{Entry, MarkdownEntry, PathEntry},
    error::Error,
    expr::{Expr, MetadataContext, Reducer, Value},
    log,
    markdown::{self, read_header, to_html},
    template::Template,
};
use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use futures::future::try_join_all;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const IGNORED_FILES: &[&str] = &[".DS_Store"];
const MARKDOWN_EXTENSION: &str = "md";
const LAYOUT_EXTENSION: &str = "html";

/// Rendered document body, bound before the layout renders.
pub const CONTENT_BODY_KEY: &str = "contentBody";

/// What happened to a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Markdown rendered into a page.
    Content,
    /// Copied byte-for-byte.
    Asset,
}

impl FileKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Asset => "assets",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Files written to the output directory.
    pub count: usize,
    /// Highest number of file tasks in flight at once.
    pub max_concurrency: usize,
}

// ============================================================================
// Sources
// ============================================================================

struct Source {
    physical: PathBuf,
    relative: PathEntry,
}

impl Source {
    fn is_markdown(&self) -> bool {
        self.physical
            .extension()
            .is_some_and(|ext| ext == MARKDOWN_EXTENSION)
    }
}

/// Collect every file under `dir`, sorted, skipping `exclude` and OS clutter.
fn collect_all_files(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| Some(entry.path()) != exclude);
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_FILES.contains(&name))
        {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Files of all content roots, each with its path relative to its root.
fn collect_sources(config: &SiteConfig) -> Result<Vec<Source>> {
    let output = &config.build.output;
    let mut seen = FxHashSet::default();
    let mut sources = Vec::new();

    for root in &config.build.content {
        if root.starts_with(output) {
            bail!(
                "content root `{}` lies inside the output directory",
                root.display()
            );
        }
        for physical in collect_all_files(root, Some(output))? {
            let relative = physical
                .strip_prefix(root)
                .map(PathEntry::from_path)
                .with_context(|| format!("`{}` is outside its content root", physical.display()))?;
            if !seen.insert(relative.to_string()) {
                bail!("`{relative}` exists in more than one content root");
            }
            sources.push(Source { physical, relative });
        }
    }
    Ok(sources)
}

async fn read_headers(sources: &[&Source]) -> Result<Vec<Arc<MarkdownEntry>>> {
    let reads = sources.iter().map(|source| async move {
        let header = read_header(&source.physical)
            .await
            .with_context(|| format!("failed to read header of {}", source.physical.display()))?;
        Ok::<_, anyhow::Error>(Arc::new(MarkdownEntry::new(source.relative.clone(), header)))
    });
    try_join_all(reads).await
}

// ============================================================================
// Layouts
// ============================================================================

/// Parse every `*.html` under `dir`, keyed by relative path without extension.
fn load_layouts(dir: &Path) -> Result<FxHashMap<String, Arc<Template>>> {
    let mut layouts = FxHashMap::default();
    if !dir.is_dir() {
        return Ok(layouts);
    }
    for path in collect_all_files(dir, None)? {
        if path.extension().is_none_or(|ext| ext != LAYOUT_EXTENSION) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let name = PathEntry::from_path(&relative.with_extension("")).to_string();
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read layout {}", path.display()))?;
        let template = Template::parse(&text)
            .with_context(|| format!("failed to parse layout {}", path.display()))?;
        layouts.insert(name, Arc::new(template));
    }
    Ok(layouts)
}

// ============================================================================
// Shared State
// ============================================================================

/// In-flight task counter that remembers its peak.
#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct GaugeGuard<'a>(&'a Gauge);

impl Gauge {
    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Site {
    context: MetadataContext,
    reducer: Reducer,
    layouts: FxHashMap<String, Arc<Template>>,
    templates: PathBuf,
    output: PathBuf,
    dirs: DirectoryCreator,
    cancel: CancellationToken,
    gauge: Gauge,
}

enum Job {
    Render(Arc<MarkdownEntry>),
    Copy,
}

impl Job {
    const fn kind(&self) -> FileKind {
        match self {
            Self::Render(_) => FileKind::Content,
            Self::Copy => FileKind::Asset,
        }
    }
}

// ============================================================================
// Build
// ============================================================================

/// Build the site described by `config`.
///
/// `on_generated` runs once per written file with its path relative to the
/// content root. The first failing file cancels every other task, and its
/// error is returned once all tasks have stopped. Canceling `cancel` stops
/// the build the same way.
pub async fn build_site<F>(
    config: &SiteConfig,
    cancel: CancellationToken,
    on_generated: F,
) -> Result<BuildSummary>
where
    F: Fn(FileKind, &PathEntry) + Send + Sync + 'static,
{
    let output = &config.build.output;
    let cancel = cancel.child_token();
    if cancel.is_cancelled() {
        return Err(Error::Canceled.into());
    }

    if config.build.clean && output.exists() {
        tokio::fs::remove_dir_all(output)
            .await
            .with_context(|| format!("failed to clean {}", output.display()))?;
    }

    let sources = collect_sources(config)?;
    let (indices, documents): (Vec<usize>, Vec<&Source>) = sources
        .iter()
        .enumerate()
        .filter(|(_, source)| source.is_markdown())
        .unzip();
    let entries = read_headers(&documents).await?;

    let reducer = Reducer::new(cancel.clone());
    let context = root_context(config);

    let mut published = Vec::with_capacity(entries.len());
    let mut renders = FxHashMap::default();
    for (index, entry) in indices.into_iter().zip(entries) {
        if entry.published(&context, &reducer).await? {
            published.push(entry.clone());
            renders.insert(index, entry);
        }
    }

    log!("metadata"; "found {} documents, {} published", documents.len(), published.len());

    let tags = aggregate_tags(&published, &context, &reducer).await?;
    let root = aggregate_categories(&published, &context, &reducer).await?;
    builtins::bind_aggregates(&context, &tags, root);

    let site = Arc::new(Site {
        context,
        reducer,
        layouts: load_layouts(&config.build.templates)?,
        templates: config.build.templates.clone(),
        output: output.clone(),
        dirs: DirectoryCreator::new(),
        cancel: cancel.clone(),
        gauge: Gauge::default(),
    });
    let on_generated = Arc::new(on_generated);

    let mut tasks = JoinSet::new();
    for (index, source) in sources.into_iter().enumerate() {
        let job = if source.is_markdown() {
            match renders.remove(&index) {
                Some(entry) => Job::Render(entry),
                None => continue,
            }
        } else {
            Job::Copy
        };
        let site = site.clone();
        let on_generated = on_generated.clone();
        tasks.spawn(async move {
            let _in_flight = site.gauge.enter();
            let kind = job.kind();
            let result = match job {
                Job::Render(entry) => render_document(&site, &entry, &source.physical).await,
                Job::Copy => copy_asset(&site, &source).await,
            };
            result.with_context(|| format!("failed to build {}", source.physical.display()))?;
            on_generated(kind, &source.relative);
            Ok::<_, anyhow::Error>(())
        });
    }

    let mut count = 0;
    let mut failure: Option<anyhow::Error> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(anyhow::Error::from).and_then(|result| result) {
            Ok(()) => count += 1,
            Err(err) => {
                cancel.cancel();
                // A real failure explains the cancellations it caused.
                if failure.as_ref().is_none_or(|first| is_canceled(first) && !is_canceled(&err)) {
                    failure = Some(err);
                }
            }
        }
    }
    if let Some(err) = failure {
        return Err(err);
    }

    Ok(BuildSummary {
        count,
        max_concurrency: site.gauge.peak(),
    })
}

fn is_canceled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::Canceled))
}

fn root_context(config: &SiteConfig) -> MetadataContext {
    let context = MetadataContext::new();
    builtins::register(&context);

    let timezone = config.timezone();
    builtins::bind_site(
        &context,
        &SiteInfo {
            title: config.base.title.clone(),
            author: config.base.author.clone(),
            lang: config.base.lang.clone(),
            timezone,
            generated: Utc::now().with_timezone(&timezone),
        },
    );
    for (name, expr) in config.metadata_bindings() {
        context.set(name, expr);
    }
    context
}

// ============================================================================
// Tasks
// ============================================================================

async fn render_document(site: &Site, entry: &Arc<MarkdownEntry>, source: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(source)
        .await
        .map_err(|err| Error::io(source, err))?;
    // The header was already read into `entry`.
    let body = Template::parse_markdown(markdown::body(&text)?)?;

    let scope = entry.scope(&site.context);
    scope.set(ENTRY_KEY, Value::Entry(Entry::Markdown(entry.clone())));
    let markdown = body.render(&scope, &site.reducer).await?;
    scope.set(CONTENT_BODY_KEY, Expr::value(to_html(&markdown)));

    let layout = layout_name(&scope, &site.reducer).await?;
    let template = site.layouts.get(&layout).ok_or_else(|| {
        anyhow!(
            "layout `{layout}` not found in {}",
            site.templates.display()
        )
    })?;
    let page = template.render(&scope, &site.reducer).await?;

    write_output(site, &entry.path().to_physical(&site.output), page.as_bytes()).await
}

async fn layout_name(scope: &MetadataContext, reducer: &Reducer) -> Result<String> {
    let name = reducer.reduce_to_string(&Expr::var("layout"), scope).await?;
    let name = name.trim();
    Ok(if name.is_empty() { DEFAULT_LAYOUT } else { name }.to_owned())
}

async fn copy_asset(site: &Site, source: &Source) -> Result<()> {
    let bytes = tokio::fs::read(&source.physical)
        .await
        .map_err(|err| Error::io(&source.physical, err))?;
    site.reducer.check_canceled()?;
    write_output(site, &source.relative.to_physical(&site.output), &bytes).await
}

/// Write through a hidden sibling so a canceled build leaves no partial file.
async fn write_output(site: &Site, target: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        site.dirs.create(parent, &site.cancel).await?;
    }

    let temp = temp_sibling(target);
    let written = async {
        tokio::fs::write(&temp, contents)
            .await
            .map_err(|err| Error::io(&temp, err))?;
        site.reducer.check_canceled()?;
        tokio::fs::rename(&temp, target)
            .await
            .map_err(|err| Error::io(target, err))
    }
    .await;

    if written.is_err() {
        tokio::fs::remove_file(&temp).await.ok();
    }
    Ok(written?)
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::fs;

    struct TestSite {
        dir: tempfile::TempDir,
        config: SiteConfig,
    }

    impl TestSite {
        fn new(layout: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            fs::create_dir_all(root.join("contents")).unwrap();
            fs::create_dir_all(root.join("templates")).unwrap();
            fs::write(root.join("templates/page.html"), layout).unwrap();

            let mut config = SiteConfig::default();
            config.set_root(root);
            config.build.content = vec![root.join("contents")];
            config.build.output = root.join("docs");
            config.build.templates = root.join("templates");
            Self { dir, config }
        }

        fn write(&self, name: &str, text: &str) {
            let path = self.dir.path().join("contents").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.dir.path().join("docs").join(name)).unwrap()
        }

        async fn build(&self) -> Result<BuildSummary> {
            build_site(&self.config, CancellationToken::new(), |_, _| {}).await
        }
    }

    #[tokio::test]
    async fn test_renders_document_through_layout() {
        let site = TestSite::new("<body>{contentBody}</body>");
        site.write("index.md", "---\ntitle: World\n---\nHello {title}!\n");

        let summary = site.build().await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(site.read("index.html"), "<body><p>Hello World!</p>\n</body>");
    }

    #[tokio::test]
    async fn test_untitled_document_defaults() {
        let site = TestSite::new("<title>{title}</title>|{date}|{entry.title}");
        site.write("hello.md", "Body only\n");

        site.build().await.unwrap();
        assert_eq!(site.read("hello.html"), "<title>hello</title>||hello");
    }

    #[tokio::test]
    async fn test_copies_assets_and_reports_each_file() {
        let site = TestSite::new("{contentBody}");
        site.write("a.md", "# A\n");
        site.write("blog/b.md", "---\ntitle: B\n---\n{relative 'style.css'}\n");
        site.write("style.css", "body { color: red }");
        site.write("img/logo.bin", "\u{0}\u{1}");
        site.write(".DS_Store", "junk");

        let generated = Arc::new(Mutex::new(Vec::new()));
        let sink = generated.clone();
        let summary = build_site(&site.config, CancellationToken::new(), move |kind, path| {
            sink.lock().push((kind, path.to_string()));
        })
        .await
        .unwrap();

        assert_eq!(summary.count, 4);
        assert!(summary.max_concurrency >= 1);
        assert_eq!(site.read("style.css"), "body { color: red }");
        assert_eq!(site.read("blog/b.html"), "<p>../style.css</p>\n");
        assert!(!site.dir.path().join("docs/.DS_Store").exists());

        let mut generated = generated.lock().clone();
        generated.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(
            generated,
            vec![
                (FileKind::Content, "a.md".to_owned()),
                (FileKind::Content, "blog/b.md".to_owned()),
                (FileKind::Asset, "img/logo.bin".to_owned()),
                (FileKind::Asset, "style.css".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_aggregates_and_named_layout() {
        let site = TestSite::new("{contentBody}");
        fs::write(
            site.dir.path().join("templates/list.html"),
            "{foreach tagList tag}{tag}:{foreach tag.entries e}{e} {end}\n{end}",
        )
        .unwrap();
        site.write("one.md", "---\ntitle: One\ndate: 2020-01-01\ntags: [rust, web]\n---\n");
        site.write("two.md", "---\ntitle: Two\ndate: 2021-01-01\ntags: [rust]\n---\n");
        site.write("draft.md", "---\ntitle: Draft\npublished: false\ntags: [rust]\n---\n");
        site.write("tags.md", "---\nlayout: list\n---\n");

        let summary = site.build().await.unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(site.read("tags.html"), "rust:One Two \nweb:One \n");
        assert!(!site.dir.path().join("docs/draft.html").exists());
    }

    #[tokio::test]
    async fn test_metadata_and_site_bindings() {
        let mut site = TestSite::new("{siteTitle}|{siteUrl}|{lang}|{contentBody}");
        site.config.base.title = "Notes".into();
        site.config
            .metadata
            .insert("siteUrl".into(), toml::Value::String("https://x.test".into()));
        site.write("index.md", "{timezone}");

        site.build().await.unwrap();
        assert_eq!(site.read("index.html"), "Notes|https://x.test|en-US|<p>+00:00</p>\n");
    }

    #[tokio::test]
    async fn test_missing_layout_fails() {
        let site = TestSite::new("{contentBody}");
        site.write("index.md", "---\nlayout: nowhere\n---\nbody\n");

        let err = site.build().await.unwrap_err();
        assert!(format!("{err:#}").contains("layout `nowhere` not found"));
        assert!(!site.dir.path().join("docs/index.html").exists());
    }

    #[tokio::test]
    async fn test_format_error_fails_build() {
        let site = TestSite::new("{contentBody}");
        site.write("bad.md", "unclosed {brace\n");
        for i in 0..8 {
            site.write(&format!("asset{i}.txt"), "x");
        }

        let err = site.build().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Format(_))));
        assert!(format!("{err:#}").contains("bad.md"));
    }

    #[tokio::test]
    async fn test_canceled_before_start() {
        let site = TestSite::new("{contentBody}");
        site.write("index.md", "body\n");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = build_site(&site.config, cancel, |_, _| {}).await.unwrap_err();
        assert!(is_canceled(&err));
        assert!(!site.dir.path().join("docs").exists());
    }

    #[tokio::test]
    async fn test_clean_removes_stale_output() {
        let mut site = TestSite::new("{contentBody}");
        site.write("index.md", "body\n");
        fs::create_dir_all(site.dir.path().join("docs")).unwrap();
        fs::write(site.dir.path().join("docs/stale.html"), "old").unwrap();

        site.config.build.clean = true;
        site.build().await.unwrap();
        assert!(!site.dir.path().join("docs/stale.html").exists());
        assert!(site.dir.path().join("docs/index.html").exists());
    }

    #[tokio::test]
    async fn test_duplicate_across_roots_fails() {
        let mut site = TestSite::new("{contentBody}");
        let extra = site.dir.path().join("extra");
        fs::create_dir_all(&extra).unwrap();
        fs::write(extra.join("index.md"), "a").unwrap();
        site.write("index.md", "b");
        site.config.build.content.push(extra);

        let err = site.build().await.unwrap_err();
        assert!(err.to_string().contains("more than one content root"));
    }

    #[test]
    fn test_temp_sibling() {
        assert_eq!(
            temp_sibling(Path::new("/out/blog/a.html")),
            PathBuf::from("/out/blog/.a.html.tmp")
        );
    }

    #[test]
    fn test_gauge_tracks_peak() {
        let gauge = Gauge::default();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
        }
        let _c = gauge.enter();
        assert_eq!(gauge.peak(), 2);
        assert_eq!(gauge.current.load(Ordering::SeqCst), 1);
    }
}
